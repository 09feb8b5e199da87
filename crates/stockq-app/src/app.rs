//! Terminal driver around the request controller.

use crate::config::AppConfig;
use crate::error::{AppError, AppResult};
use serde_json::json;
use std::io::Write;
use std::time::Duration;
use stockq_pipeline::{
    ControllerEvent, FetchFilterPipeline, RequestController, RunReport, ToggleAction,
};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::mpsc;
use tracing::{debug, info};

/// How results are written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// One record per line, then a status line.
    #[default]
    Text,
    /// JSON lines: one object per record, then a status object.
    Json,
}

/// Owns the controller and its event stream.
pub struct Application {
    controller: RequestController,
    events: mpsc::UnboundedReceiver<ControllerEvent>,
    format: OutputFormat,
}

impl Application {
    /// Build the source and pipeline described by `config`.
    pub fn new(config: AppConfig) -> AppResult<Self> {
        let source = config.line_source()?;
        info!(
            source = %source,
            layout = %config.source.layout,
            case_insensitive = config.search.case_insensitive,
            "Application configured"
        );
        Ok(Self::with_pipeline(FetchFilterPipeline::new(
            source,
            config.pipeline_config(),
        )))
    }

    pub fn with_pipeline(pipeline: FetchFilterPipeline) -> Self {
        let (controller, events) = RequestController::new(pipeline);
        Self {
            controller,
            events,
            format: OutputFormat::default(),
        }
    }

    pub fn with_format(mut self, format: OutputFormat) -> Self {
        self.format = format;
        self
    }

    pub fn controller(&self) -> &RequestController {
        &self.controller
    }

    /// Run one search to its outcome and write the result.
    ///
    /// With `cancel_after`, cancellation is requested once that much time
    /// has passed and the run is still in flight.
    pub async fn search<W: Write>(
        &mut self,
        identifier: &str,
        cancel_after: Option<Duration>,
        out: &mut W,
    ) -> AppResult<RunReport> {
        self.controller.wait_idle().await;

        let run_id = match self.controller.toggle(identifier) {
            ToggleAction::Started { run_id } => run_id,
            ToggleAction::CancelRequested { run_id } | ToggleAction::Ignored { run_id } => {
                return Err(AppError::Busy(run_id))
            }
        };

        let deadline = async {
            match cancel_after {
                Some(after) => tokio::time::sleep(after).await,
                None => std::future::pending().await,
            }
        };
        tokio::pin!(deadline);
        let mut cancel_sent = false;

        let report = loop {
            tokio::select! {
                event = self.events.recv() => match event {
                    Some(ControllerEvent::Finished(report)) if report.run_id == run_id => break report,
                    Some(event) => debug!(?event, "Controller event"),
                    None => return Err(AppError::ControllerStopped),
                },
                _ = &mut deadline, if !cancel_sent => {
                    cancel_sent = true;
                    if self.controller.cancel() {
                        debug!(run_id, "Cancel deadline reached");
                    }
                }
            }
        };

        self.write_report(&report, out)?;
        Ok(report)
    }

    /// Line-driven toggle loop.
    ///
    /// A ticker starts a search, or cancels the one in flight. An empty line
    /// cancels. `quit`/`exit`, Ctrl-C or end of input cancel any run in
    /// flight and return once it has finished.
    pub async fn run_interactive<R, W>(&mut self, input: R, out: &mut W) -> AppResult<()>
    where
        R: AsyncBufRead + Unpin,
        W: Write,
    {
        let mut lines = input.lines();
        let mut input_open = true;

        writeln!(out, "Enter a ticker to search, empty line to cancel, 'quit' to exit")?;
        out.flush()?;

        loop {
            tokio::select! {
                line = lines.next_line(), if input_open => {
                    match line? {
                        Some(line) => match line.trim() {
                            "quit" | "exit" => {
                                input_open = false;
                                self.controller.cancel();
                            }
                            "" => {
                                if !self.controller.cancel() {
                                    writeln!(out, "Nothing to cancel")?;
                                }
                            }
                            identifier => {
                                if let ToggleAction::Ignored { run_id } = self.controller.toggle(identifier) {
                                    writeln!(out, "Run {run_id} is still cancelling")?;
                                }
                            }
                        },
                        None => {
                            debug!("Input closed");
                            input_open = false;
                            self.controller.cancel();
                        }
                    }
                }
                Ok(()) = tokio::signal::ctrl_c(), if input_open => {
                    info!("Interrupt received");
                    input_open = false;
                    self.controller.cancel();
                }
                event = self.events.recv() => match event {
                    Some(event) => self.write_event(&event, out)?,
                    None => return Err(AppError::ControllerStopped),
                },
            }

            out.flush()?;
            if !input_open && self.controller.is_idle() {
                break;
            }
        }

        // The final report may be queued behind the state change.
        while let Ok(event) = self.events.try_recv() {
            self.write_event(&event, out)?;
        }
        out.flush()?;
        Ok(())
    }

    fn write_event<W: Write>(&self, event: &ControllerEvent, out: &mut W) -> AppResult<()> {
        match (event, self.format) {
            (ControllerEvent::Finished(report), _) => self.write_report(report, out)?,
            (ControllerEvent::Started { identifier, .. }, OutputFormat::Text) => {
                writeln!(out, "Searching for {identifier}...")?;
            }
            (ControllerEvent::CancelRequested { .. }, OutputFormat::Text) => {
                writeln!(out, "Cancellation requested")?;
            }
            (ControllerEvent::Started { run_id, identifier }, OutputFormat::Json) => {
                serde_json::to_writer(
                    &mut *out,
                    &json!({ "event": "started", "run_id": run_id, "identifier": identifier }),
                )?;
                writeln!(out)?;
            }
            (ControllerEvent::CancelRequested { run_id, identifier }, OutputFormat::Json) => {
                serde_json::to_writer(
                    &mut *out,
                    &json!({ "event": "cancel_requested", "run_id": run_id, "identifier": identifier }),
                )?;
                writeln!(out)?;
            }
        }
        Ok(())
    }

    fn write_report<W: Write>(&self, report: &RunReport, out: &mut W) -> AppResult<()> {
        match self.format {
            OutputFormat::Text => {
                for record in report.records() {
                    writeln!(out, "{record}")?;
                }
                writeln!(out, "{}", report.status_message())?;
            }
            OutputFormat::Json => {
                for record in report.records() {
                    serde_json::to_writer(&mut *out, record)?;
                    writeln!(out)?;
                }
                serde_json::to_writer(
                    &mut *out,
                    &json!({
                        "event": "finished",
                        "run_id": report.run_id,
                        "identifier": report.identifier,
                        "outcome": report.outcome.label(),
                        "matched": report.records().len(),
                        "elapsed_ms": report.elapsed.as_millis() as u64,
                        "status": report.status_message(),
                    }),
                )?;
                writeln!(out)?;
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for Application {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Application")
            .field("controller", &self.controller)
            .field("format", &self.format)
            .finish()
    }
}
