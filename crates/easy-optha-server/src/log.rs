use std::sync::Once;

use tracing_subscriber::{
    fmt::{
        format::{DefaultFields, Format},
        writer::BoxMakeWriter,
        SubscriberBuilder,
    },
    EnvFilter,
};

use crate::config::{LogConfig, LogFormat};

static INIT: Once = Once::new();

type Subscriber = Box<dyn tracing::Subscriber + Send + Sync>;

/// Install the global subscriber. Later calls are ignored.
pub fn init(config: &LogConfig) {
    INIT.call_once(|| {
        let subscriber = set_format(config, builder(config));

        if tracing::subscriber::set_global_default(subscriber).is_err() {
            eprintln!("A tracing subscriber was already installed");
        }
    });
}

/// `RUST_LOG` wins over the configured level when set.
pub fn builder(config: &LogConfig) -> SubscriberBuilder<DefaultFields, Format, EnvFilter, BoxMakeWriter> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.level.to_string()));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(config.ansi_enabled)
        .with_writer(BoxMakeWriter::new(std::io::stdout))
}

pub fn set_format(
    config: &LogConfig,
    builder: SubscriberBuilder<DefaultFields, Format, EnvFilter, BoxMakeWriter>,
) -> Subscriber {
    match &config.format {
        LogFormat::Pretty => Box::new(builder.pretty().finish()),
        LogFormat::Structured => Box::new(builder.json().finish()),
        LogFormat::Text => Box::new(builder.finish()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LogLevel;
    use std::io;
    use std::sync::{Arc, Mutex};
    use tracing::dispatcher::set_default;
    use tracing::{debug, info, warn};
    use tracing_subscriber::fmt::MakeWriter;

    #[derive(Clone, Default)]
    struct MockMakeWriter {
        buf: Arc<Mutex<Vec<u8>>>,
    }

    impl MockMakeWriter {
        fn get_string(&self) -> String {
            String::from_utf8(self.buf.lock().unwrap().clone()).unwrap()
        }
    }

    impl io::Write for MockMakeWriter {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.buf.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for MockMakeWriter {
        type Writer = Self;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    fn capture(config: &LogConfig) -> (MockMakeWriter, tracing::Dispatch) {
        let make_writer = MockMakeWriter::default();
        let subscriber = builder(config).with_writer(BoxMakeWriter::new(make_writer.clone()));
        let subscriber = set_format(config, subscriber);
        (make_writer, tracing::Dispatch::new(subscriber))
    }

    #[test]
    fn test_level_filters() {
        let mut config = LogConfig::with_level(LogLevel::Warn);
        config.format = LogFormat::Text;
        config.ansi_enabled = false;
        let (make_writer, dispatch) = capture(&config);
        let _default = set_default(&dispatch);

        debug!("debug message");
        info!("info message");
        warn!("warn message");

        let contents = make_writer.get_string();
        assert!(!contents.contains("debug message"));
        assert!(!contents.contains("info message"));
        assert!(contents.contains("warn message"));
    }

    #[test]
    fn test_structured_format() {
        let mut config = LogConfig::with_level(LogLevel::Info);
        config.format = LogFormat::Structured;
        config.ansi_enabled = false;
        let (make_writer, dispatch) = capture(&config);
        let _default = set_default(&dispatch);

        info!(patient_id = "P123", "Scan added");

        let contents = make_writer.get_string();
        let line: serde_json::Value = serde_json::from_str(contents.trim()).unwrap();
        assert_eq!(line["fields"]["message"], "Scan added");
        assert_eq!(line["fields"]["patient_id"], "P123");
    }
}
