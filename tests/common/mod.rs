#![allow(dead_code)]

pub mod temp_files {
    use std::io::Write;
    use tempfile::NamedTempFile;

    /// Write `content` to a fresh temporary file with the given extension.
    /// The file is removed when the handle drops.
    pub fn create_temp_file(content: &str, ext: &str) -> NamedTempFile {
        let mut file = tempfile::Builder::new()
            .prefix("formbind_test_")
            .suffix(&format!(".{ext}"))
            .tempfile()
            .unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    pub fn create_temp_yaml(content: &str) -> NamedTempFile {
        create_temp_file(content, "yaml")
    }
}

pub mod fixtures {
    use formbind::{RequestContext, SourceBundle};
    use http::{HeaderValue, Method};

    pub fn ctx(handler_name: &str) -> RequestContext {
        RequestContext::new(Method::POST, format!("/test/{handler_name}"), handler_name)
    }

    pub fn json_bundle(body: &str) -> SourceBundle {
        SourceBundle::new()
            .with_header(http::header::CONTENT_TYPE, HeaderValue::from_static("application/json"))
            .with_body(body.to_string())
    }

    pub fn form_bundle(body: &str) -> SourceBundle {
        SourceBundle::new()
            .with_header(
                http::header::CONTENT_TYPE,
                HeaderValue::from_static("application/x-www-form-urlencoded"),
            )
            .with_body(body.to_string())
    }
}

pub mod emitter {
    use formbind::{Failure, RequestContext, ResponseEmitter};
    use serde_json::Value;
    use std::sync::Mutex;

    /// What a [`RecordingEmitter`] was told.
    #[derive(Debug, Clone, PartialEq)]
    pub enum Emitted {
        Success(Option<Value>),
        Failure(String),
    }

    /// Emitter that remembers every call, for asserting "called exactly once".
    #[derive(Debug, Default)]
    pub struct RecordingEmitter {
        calls: Mutex<Vec<Emitted>>,
    }

    impl RecordingEmitter {
        pub fn calls(&self) -> Vec<Emitted> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl ResponseEmitter for RecordingEmitter {
        type Response = Emitted;

        fn on_success(&self, _ctx: &RequestContext, value: Option<Value>) -> Emitted {
            let emitted = Emitted::Success(value);
            self.calls.lock().unwrap().push(emitted.clone());
            emitted
        }

        fn on_failure(&self, _ctx: &RequestContext, failure: &Failure) -> Emitted {
            let emitted = Emitted::Failure(failure.to_string());
            self.calls.lock().unwrap().push(emitted.clone());
            emitted
        }
    }
}

pub mod tracing_setup {
    use tracing::subscriber::DefaultGuard;

    /// Route this test's logs to the test writer so `cargo test -- --nocapture`
    /// shows them next to the failing assertion.
    pub fn init() -> DefaultGuard {
        let subscriber = tracing_subscriber::fmt()
            .with_env_filter("formbind=trace")
            .with_test_writer()
            .finish();
        tracing::subscriber::set_default(subscriber)
    }
}
