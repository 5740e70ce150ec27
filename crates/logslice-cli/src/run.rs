//! A complete `logslice` run built from a [`Config`].

use std::path::PathBuf;

use chrono::Utc;
use tracing::info;

use logslice_core::{
    Endpoints, FetchJob, FetchPipeline, FileSink, LogSink, RunHeader, RunSummary,
};

use crate::config::Config;
use crate::error::Result;
use crate::http::HttpLogApi;

/// Result of a successful run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    /// Run totals.
    pub summary: RunSummary,
    /// File the content was written to.
    pub output: PathBuf,
}

/// Retrieves the configured interval into the configured file.
///
/// The output file is truncated and its header written before the first
/// request, so a failed run still leaves a file describing what was attempted
/// followed by every window retrieved before the failure.
///
/// # Errors
///
/// Returns the first configuration, transport, parse or I/O failure.
pub async fn execute(config: &Config) -> Result<RunReport> {
    let zone = config.time_zone()?;
    let target = config.run_target()?;
    let filter = config.query_filter();
    let api = HttpLogApi::new(&config.connection)?;

    let mut sink = FileSink::create(&config.output.directory, &config.output.file)?;
    let output = sink.path().to_path_buf();
    sink.write_header(&RunHeader {
        namespace: config.log.namespace.trim().to_string(),
        pod: config.log.pod.clone(),
        source: config.log.source.trim().to_string(),
        interval: target.interval(),
        filter: filter.clone(),
        started_at: Utc::now().with_timezone(&zone).fixed_offset(),
        destination: output.display().to_string(),
    })?;
    info!(path = %output.display(), "output file initialised");

    let job = FetchJob::new(target, filter, config.log.source.trim())
        .with_content_field(config.log.content_field.clone())
        .with_policy(config.window_policy());
    let pipeline = FetchPipeline::new(api, Endpoints::new(config.connection.base_url.trim()));
    let summary = pipeline.run(&job, &mut sink).await?;

    Ok(RunReport { summary, output })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CliError;
    use logslice_core::SliceError;
    use mockito::{Matcher, Server};
    use tempfile::TempDir;

    fn config(base_url: &str, dir: &TempDir) -> Config {
        let toml = format!(
            r#"
[connection]
base_url = "{base_url}"
cookie = "session=abc"
token = "tok"

[log]
namespace = "payments"
source = "/var/log/app.log"
start = "2024-05-01T08:00:00+02:00"
end = "2024-05-01T09:00:00+02:00"

[output]
file = "run.txt"
directory = "{}"
pause_on_exit = false
"#,
            dir.path().join("out").display()
        );
        Config::from_toml(&toml).unwrap()
    }

    #[tokio::test]
    async fn downloads_interval_into_file() {
        let mut server = Server::new_async().await;
        let aggregate = server
            .mock("GET", Matcher::Regex(r"^/rest/v2/logs/aggregate".to_string()))
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded(
                    "query".into(),
                    r#"k8s.namespace.name="payments" AND log.source="/var/log/app.log""#.into(),
                ),
                Matcher::UrlEncoded("from".into(), "2024-05-01T08:00:00.000+02:00".into()),
                Matcher::UrlEncoded("to".into(), "2024-05-01T09:00:00.000+02:00".into()),
            ]))
            .match_header("x-csrftoken", "tok")
            .with_status(200)
            .with_body(r#"{"aggregationResult":{"log.source":{"/var/log/app.log":2}}}"#)
            .expect(1)
            .create_async()
            .await;
        let search = server
            .mock("GET", Matcher::Regex(r"^/rest/v2/logs/search".to_string()))
            .match_query(Matcher::UrlEncoded("limit".into(), "1000".into()))
            .with_status(200)
            .with_body(
                r#"{"results":[{"timestamp":1,"content":"first line"},{"timestamp":2,"content":"second line"}]}"#,
            )
            .expect(1)
            .create_async()
            .await;

        let dir = TempDir::new().unwrap();
        let config = config(&server.url(), &dir);
        let report = execute(&config).await.unwrap();

        aggregate.assert_async().await;
        search.assert_async().await;
        assert_eq!(report.summary.entries_written, 2);
        assert_eq!(report.summary.windows_fetched, 1);
        assert_eq!(report.output, dir.path().join("out").join("run.txt"));

        let written = std::fs::read_to_string(&report.output).unwrap();
        assert!(written.contains("SOURCE NAMESPACE:         payments"));
        assert!(written.ends_with("#\n\nfirst line\nsecond line\n"));
    }

    #[tokio::test]
    async fn failed_run_keeps_header() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", Matcher::Any)
            .with_status(403)
            .create_async()
            .await;

        let dir = TempDir::new().unwrap();
        let config = config(&server.url(), &dir);
        let err = execute(&config).await.unwrap_err();

        assert!(matches!(
            err,
            CliError::Slice(SliceError::Transport { status: 403, .. })
        ));
        let written = std::fs::read_to_string(config.output_path()).unwrap();
        assert!(written.contains("ORIGINALLY WRITTEN TO:"));
    }
}
