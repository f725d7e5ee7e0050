#![allow(dead_code)]

pub mod temp_files {
    use std::io::Write;
    use tempfile::NamedTempFile;

    /// Write `content` to a fresh temporary file with the given extension.
    ///
    /// The file is removed when the returned handle drops.
    pub fn create_temp(content: &str, ext: &str) -> NamedTempFile {
        let mut file = tempfile::Builder::new()
            .prefix("elfaro_test_")
            .suffix(&format!(".{ext}"))
            .tempfile()
            .unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    pub fn create_temp_yaml(content: &str) -> NamedTempFile {
        create_temp(content, "yaml")
    }
}

pub mod fixtures {
    use elfaro::app::AppState;
    use elfaro::config::AppConfig;
    use elfaro::models::{NewArticle, NewUser, Plan};
    use elfaro::repository::{ArticleRepository, UserRepository};
    use elfaro::security::hash_password;
    use std::sync::Arc;

    /// Article draft that passes validation.
    pub fn draft(title: &str) -> NewArticle {
        NewArticle::new(
            title,
            "Bajada de prueba para la portada",
            "Contenido de prueba con el largo mínimo que exige la validación de artículos.",
        )
    }

    pub fn memory_state() -> Arc<AppState> {
        Arc::new(AppState::from_config(AppConfig::default()).unwrap())
    }

    pub fn unseeded_config() -> AppConfig {
        let mut config = AppConfig::default();
        config.backend.seed = false;
        config
    }

    /// `count` articles published one day apart, the first one oldest.
    pub fn articles(repo: &dyn ArticleRepository, count: usize, category: &str) {
        let start = elfaro::models::timestamp::parse("2024-03-01 08:00:00").unwrap();
        for i in 0..count {
            let published = start + chrono::Duration::days(i as i64);
            repo.create(
                draft(&format!("Titular número {i}"))
                .in_category(category)
                .published(published),
            )
            .unwrap();
        }
    }

    pub fn user(repo: &dyn UserRepository, email: &str, password: &str) {
        repo.create(
            NewUser::new("Lectora de Prueba", email, &hash_password(password).unwrap())
                .with_plan(Plan::Basic, true),
        )
        .unwrap();
    }
}

pub mod test_server {
    use elfaro::app::{build_service, AppState};
    use elfaro::config::AppConfig;
    use elfaro::server::{HttpServer, ServerHandle};
    use reqwest::blocking::{Client, Response};
    use reqwest::header::{COOKIE, SET_COOKIE};
    use reqwest::redirect::Policy;
    use std::sync::Arc;

    /// Running server on an ephemeral port, stopped on drop.
    pub struct TestServer {
        handle: Option<ServerHandle>,
        pub state: Arc<AppState>,
        pub base: String,
    }

    impl TestServer {
        pub fn start(config: AppConfig) -> Self {
            let state = Arc::new(AppState::from_config(config).unwrap());
            let service = build_service(&state).unwrap();
            let handle = HttpServer(service).start("127.0.0.1:0", 2).unwrap();
            handle.wait_ready().unwrap();
            let base = format!("http://{}{}", handle.addr(), state.config.base_path);
            Self {
                handle: Some(handle),
                state,
                base,
            }
        }

        pub fn url(&self, path: &str) -> String {
            format!("{}{}", self.base, path)
        }

        pub fn browser(&self) -> Browser {
            Browser {
                client: Client::builder().redirect(Policy::none()).build().unwrap(),
                base: self.base.clone(),
                cookie: None,
            }
        }
    }

    impl Drop for TestServer {
        fn drop(&mut self) {
            if let Some(handle) = self.handle.take() {
                handle.stop();
            }
        }
    }

    /// Blocking client that keeps the session cookie between requests and never follows
    /// redirects.
    pub struct Browser {
        client: Client,
        base: String,
        pub cookie: Option<String>,
    }

    impl Browser {
        fn remember(&mut self, resp: &Response) {
            if let Some(value) = resp.headers().get(SET_COOKIE) {
                let pair = value.to_str().unwrap().split(';').next().unwrap();
                self.cookie = Some(pair.to_string());
            }
        }

        pub fn get(&mut self, path: &str) -> Response {
            let mut req = self.client.get(format!("{}{}", self.base, path));
            if let Some(cookie) = &self.cookie {
                req = req.header(COOKIE, cookie);
            }
            let resp = req.send().unwrap();
            self.remember(&resp);
            resp
        }

        pub fn post_form(&mut self, path: &str, form: &[(&str, &str)]) -> Response {
            let mut req = self.client.post(format!("{}{}", self.base, path)).form(form);
            if let Some(cookie) = &self.cookie {
                req = req.header(COOKIE, cookie);
            }
            let resp = req.send().unwrap();
            self.remember(&resp);
            resp
        }

        /// CSRF token of the current session, read from a page's JSON view-model.
        pub fn csrf_token(&mut self, path: &str) -> String {
            let body: serde_json::Value = self.get(path).json().unwrap();
            body["csrf_token"].as_str().unwrap().to_string()
        }
    }
}

pub mod mock_postgrest {
    use std::io::Read;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex};
    use std::thread::{self, JoinHandle};
    use std::time::Duration;

    #[derive(Debug, Clone)]
    pub struct Recorded {
        pub method: String,
        pub url: String,
        pub headers: Vec<(String, String)>,
        pub body: String,
    }

    impl Recorded {
        pub fn header(&self, name: &str) -> Option<&str> {
            self.headers
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(name))
                .map(|(_, v)| v.as_str())
        }
    }

    pub struct Reply {
        pub status: u16,
        pub body: String,
        pub headers: Vec<(String, String)>,
    }

    impl Reply {
        pub fn json(status: u16, body: serde_json::Value) -> Self {
            Self {
                status,
                body: body.to_string(),
                headers: vec![("Content-Type".into(), "application/json".into())],
            }
        }

        pub fn with_header(mut self, name: &str, value: &str) -> Self {
            self.headers.push((name.to_string(), value.to_string()));
            self
        }
    }

    /// A PostgREST stand-in that answers every request through `respond` and records it.
    pub struct MockPostgrest {
        pub url: String,
        server: Arc<tiny_http::Server>,
        stop: Arc<AtomicBool>,
        worker: Option<JoinHandle<()>>,
        requests: Arc<Mutex<Vec<Recorded>>>,
    }

    impl MockPostgrest {
        pub fn start<F>(respond: F) -> Self
        where
            F: Fn(&Recorded) -> Reply + Send + 'static,
        {
            let server = Arc::new(tiny_http::Server::http("127.0.0.1:0").unwrap());
            let addr = server.server_addr().to_ip().unwrap();
            let stop = Arc::new(AtomicBool::new(false));
            let requests = Arc::new(Mutex::new(Vec::new()));

            let worker = {
                let server = Arc::clone(&server);
                let stop = Arc::clone(&stop);
                let requests = Arc::clone(&requests);
                thread::spawn(move || {
                    while !stop.load(Ordering::SeqCst) {
                        let Ok(Some(mut request)) = server.recv_timeout(Duration::from_millis(50))
                        else {
                            continue;
                        };
                        let mut body = String::new();
                        request.as_reader().read_to_string(&mut body).unwrap();
                        let recorded = Recorded {
                            method: request.method().as_str().to_string(),
                            url: request.url().to_string(),
                            headers: request
                                .headers()
                                .iter()
                                .map(|h| (h.field.to_string(), h.value.to_string()))
                                .collect(),
                            body,
                        };
                        let reply = respond(&recorded);
                        requests.lock().unwrap().push(recorded);

                        let mut response = tiny_http::Response::from_string(reply.body)
                            .with_status_code(reply.status);
                        for (name, value) in reply.headers {
                            response = response.with_header(
                                tiny_http::Header::from_bytes(name.as_bytes(), value.as_bytes())
                                    .unwrap(),
                            );
                        }
                        let _ = request.respond(response);
                    }
                })
            };

            Self {
                url: format!("http://{addr}"),
                server,
                stop,
                worker: Some(worker),
                requests,
            }
        }

        pub fn requests(&self) -> Vec<Recorded> {
            self.requests.lock().unwrap().clone()
        }

        /// Remote configuration pointing at this mock.
        pub fn config(&self) -> elfaro::config::AppConfig {
            let mut config = elfaro::config::AppConfig::default();
            config.backend.kind = elfaro::config::BackendKind::Remote;
            config.backend.remote.url = Some(self.url.clone());
            config.backend.remote.key = Some("anon-key".to_string());
            config.backend.remote.timeout_secs = 2;
            config
        }
    }

    impl Drop for MockPostgrest {
        fn drop(&mut self) {
            self.stop.store(true, Ordering::SeqCst);
            self.server.unblock();
            if let Some(worker) = self.worker.take() {
                let _ = worker.join();
            }
        }
    }
}
