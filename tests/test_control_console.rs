//! Integration tests for the operator console loop
//!
//! Feeds scripted lines through the same channel the stdin reader uses and
//! captures console output in memory.

#[cfg(test)]
mod control_console_tests {
    use sensor_analyzer::{
        config::ControlConfig,
        control::{load_export, ConsoleInput, ControlLoop},
        AggregateStore, ShutdownSignal,
    };
    use std::{sync::Arc, time::Duration};
    use tempfile::TempDir;
    use tokio::sync::mpsc;

    fn control_config(default_export_path: &str) -> ControlConfig {
        ControlConfig {
            enabled: true,
            poll_interval: Duration::from_millis(20),
            default_export_path: default_export_path.to_string(),
        }
    }

    async fn run_script(
        store: Arc<AggregateStore>,
        shutdown: ShutdownSignal,
        config: ControlConfig,
        lines: &[&str],
        close_input: bool,
    ) -> String {
        let (tx, rx) = mpsc::channel(lines.len().max(1) + 1);
        for line in lines {
            tx.send(ConsoleInput::Line(line.to_string())).await.unwrap();
        }
        // Keep the sender alive unless the script ends with EOF
        let _held = if close_input {
            drop(tx);
            None
        } else {
            Some(tx)
        };

        let mut control = ControlLoop::new(store, shutdown, config, Vec::new());
        tokio::time::timeout(Duration::from_secs(5), control.run(Some(rx)))
            .await
            .expect("console loop should finish");

        String::from_utf8(control.into_output()).unwrap()
    }

    #[tokio::test]
    async fn test_scripted_session() {
        let dir = TempDir::new().unwrap();
        let export_path = dir.path().join("Session Export.json");

        let store = Arc::new(AggregateStore::new(10));
        for value in [10.0, 20.0, 30.0] {
            store.record_reading("Temp", value);
        }
        let shutdown = ShutdownSignal::new();

        let export_line = format!("export {}", export_path.display());
        let output = run_script(
            store.clone(),
            shutdown.clone(),
            control_config("unused.json"),
            &["help", "filter temp", "stats", export_line.as_str(), "launch rockets", "quit"],
            false,
        )
        .await;

        assert!(output.starts_with("> "));
        assert!(output.contains("Available Commands:"));
        assert!(output.contains("--- Current Sensor Statistics ---"));
        assert!(output.contains("Mean:  20.00"));
        assert!(output.contains("Exported 1 sensor types to"));

        assert_eq!(store.filter().as_deref(), Some("Temp"));
        assert!(shutdown.is_triggered());

        let exported = load_export(&export_path).unwrap();
        assert_eq!(exported["Temp"].values, vec![10.0, 20.0, 30.0]);
        assert_eq!(exported["Temp"].count, 3);
    }

    #[tokio::test]
    async fn test_filter_all_clears_selection() {
        let store = Arc::new(AggregateStore::new(10));
        let shutdown = ShutdownSignal::new();

        run_script(
            store.clone(),
            shutdown,
            control_config("unused.json"),
            &["filter pressure", "filter all", "exit"],
            false,
        )
        .await;

        assert!(store.filter().is_none());
        assert!(store.should_log("Temperature"));
    }

    #[tokio::test]
    async fn test_filter_selects_non_ascii_sensor_type() {
        let store = Arc::new(AggregateStore::new(10));

        run_script(
            store.clone(),
            ShutdownSignal::new(),
            control_config("unused.json"),
            &["filter TEMPÉRATURE", "quit"],
            false,
        )
        .await;

        assert_eq!(store.filter().as_deref(), Some("Température"));
        assert!(store.should_log("TEMPÉRATURE"));
        assert!(store.should_log("température"));
        assert!(!store.should_log("Pression"));
    }

    #[tokio::test]
    async fn test_export_uses_default_path() {
        let dir = TempDir::new().unwrap();
        let default_path = dir.path().join("sensor_stats_export.json");

        let store = Arc::new(AggregateStore::new(10));
        store.record_reading("Pressure", 1013.0);

        run_script(
            store,
            ShutdownSignal::new(),
            control_config(&default_path.to_string_lossy()),
            &["export", "quit"],
            false,
        )
        .await;

        let exported = load_export(&default_path).unwrap();
        assert_eq!(exported["Pressure"].mean, Some(1013.0));
        assert_eq!(exported["Pressure"].stdev, None);
    }

    #[tokio::test]
    async fn test_failed_export_keeps_console_running() {
        let dir = TempDir::new().unwrap();
        let bad_path = dir.path().join("missing").join("deeper").join("out.json");

        let store = Arc::new(AggregateStore::new(10));
        store.record_reading("Temp", 1.0);
        let shutdown = ShutdownSignal::new();

        let export_line = format!("export {}", bad_path.display());
        let output = run_script(
            store,
            shutdown.clone(),
            control_config("unused.json"),
            &[export_line.as_str(), "stats", "quit"],
            false,
        )
        .await;

        assert!(output.contains("Export failed:"));
        assert!(output.contains("--- Current Sensor Statistics ---"));
        assert!(!bad_path.exists());
        assert!(shutdown.is_triggered());
    }

    #[tokio::test]
    async fn test_end_of_input_triggers_shutdown() {
        let store = Arc::new(AggregateStore::new(10));
        let shutdown = ShutdownSignal::new();

        let output = run_script(
            store,
            shutdown.clone(),
            control_config("unused.json"),
            &["stats"],
            true,
        )
        .await;

        assert!(output.contains("No statistics calculated yet."));
        assert!(shutdown.is_triggered());
    }

    #[tokio::test]
    async fn test_shutdown_stops_idle_console() {
        let store = Arc::new(AggregateStore::new(10));
        let shutdown = ShutdownSignal::new();
        let (_tx, rx) = mpsc::channel::<ConsoleInput>(1);

        let handle = {
            let shutdown = shutdown.clone();
            tokio::spawn(async move {
                let mut control =
                    ControlLoop::new(store, shutdown, control_config("unused.json"), Vec::new());
                control.run(Some(rx)).await;
            })
        };

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(!handle.is_finished());

        shutdown.trigger("test");
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("console should notice shutdown within a poll interval")
            .unwrap();
    }

    #[tokio::test]
    async fn test_missing_input_is_inert_until_shutdown() {
        let store = Arc::new(AggregateStore::new(10));
        let shutdown = ShutdownSignal::new();

        let handle = {
            let shutdown = shutdown.clone();
            tokio::spawn(async move {
                let mut control =
                    ControlLoop::new(store, shutdown, control_config("unused.json"), Vec::new());
                control.run(None).await;
                control.into_output()
            })
        };

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(!handle.is_finished());
        assert!(!shutdown.is_triggered());

        shutdown.trigger("test");
        let output = tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("inert console should stop on shutdown")
            .unwrap();
        assert!(output.is_empty());
    }

    #[tokio::test]
    async fn test_unavailable_input_does_not_stop_service() {
        let store = Arc::new(AggregateStore::new(10));
        let shutdown = ShutdownSignal::new();
        let (tx, rx) = mpsc::channel(1);
        tx.send(ConsoleInput::Unavailable(std::io::Error::new(
            std::io::ErrorKind::Other,
            "terminal detached",
        )))
        .await
        .unwrap();
        drop(tx);

        let handle = {
            let shutdown = shutdown.clone();
            tokio::spawn(async move {
                let mut control =
                    ControlLoop::new(store, shutdown, control_config("unused.json"), Vec::new());
                control.run(Some(rx)).await;
            })
        };

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(!shutdown.is_triggered());
        assert!(!handle.is_finished());

        shutdown.trigger("test");
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
