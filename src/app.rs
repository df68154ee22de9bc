use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::Local;
use cogex_experiment::{EngineState, Response, TrialEngine};
use cogex_sink::{DualSink, FallbackSink, JsonWorkbook, PrimarySink, ResultSink, SheetError, export};
use cogex_timing::MonotonicClock;
use rand::rngs::StdRng;

use crate::settings::{Settings, SinkSettings};
use crate::terminal::{Key, Screen};

pub type StationSink = DualSink<PrimarySink, FallbackSink>;
pub type Engine = TrialEngine<MonotonicClock, StdRng, StationSink>;

pub fn build_sink(settings: &SinkSettings) -> Result<StationSink> {
    let fallback = FallbackSink::new(&settings.fallback_path);
    let Some(primary) = &settings.primary else {
        tracing::info!(path = %settings.fallback_path.display(), "no primary sink configured");
        return Ok(DualSink::fallback_only(fallback));
    };
    let client = JsonWorkbook::new(&primary.workbook_dir);
    let sink = PrimarySink::spawn(client, &primary.destination, primary.timeout())
        .context("start primary sink writer")?;
    tracing::info!(
        destination = %primary.destination,
        timeout_ms = primary.timeout_ms,
        "primary sink ready"
    );
    Ok(DualSink::new(sink, fallback))
}

/// Terminal driver: owns the engine and feeds it one call per action.
pub struct App {
    engine: Engine,
    screen: Screen,
    export_dir: PathBuf,
    exported: Option<PathBuf>,
}

impl App {
    pub fn new(engine: Engine, settings: &Settings) -> Self {
        Self {
            engine,
            screen: Screen::new(),
            export_dir: settings.export_dir.clone(),
            exported: None,
        }
    }

    /// Runs until the operator quits. Returns the sink's operator alert, if any.
    pub fn run(mut self) -> Result<Option<SheetError>> {
        loop {
            let keep_going = match self.engine.state() {
                EngineState::AwaitingConsent => self.consent()?,
                EngineState::AwaitingStart => self.await_start()?,
                EngineState::Presenting => self.present()?,
                EngineState::AwaitingResponse => self.await_response()?,
                EngineState::Complete => self.complete()?,
            };
            if !keep_going {
                break;
            }
        }
        self.screen.leave_raw()?;
        Ok(self.engine.sink().operator_alert().cloned())
    }

    fn consent(&mut self) -> Result<bool> {
        println!("\nNumber Recognition Experiment\n");
        loop {
            let Some(name) = self.screen.prompt("Enter your name: ")? else {
                return Ok(false);
            };
            let Some(age) = self.screen.prompt("Enter your age: ")? else {
                return Ok(false);
            };
            let Ok(age) = age.trim().parse::<u32>() else {
                println!("Age must be a whole number.");
                continue;
            };
            match self.engine.submit(&name, age) {
                Ok(()) => return Ok(true),
                Err(e) if !e.is_internal() => println!("{e}. Please try again."),
                Err(e) => return Err(e.into()),
            }
        }
    }

    fn await_start(&mut self) -> Result<bool> {
        self.screen.enter_raw()?;
        self.screen
            .message(&["Press the spacebar to begin the experiment", "", "(Esc quits)"])?;
        loop {
            match self.screen.next_key()? {
                Key::Space => {
                    self.engine.begin()?;
                    return Ok(true);
                }
                Key::Quit => return Ok(false),
                Key::Char(_) => {}
            }
        }
    }

    fn present(&mut self) -> Result<bool> {
        let snapshot = self.engine.snapshot();
        let Some(trial) = snapshot.current_trial else {
            return Ok(true);
        };
        self.screen.enter_raw()?;
        self.screen
            .show_trial(trial, snapshot.trial_index + 1, snapshot.trial_limit)?;
        let dropped = self.screen.discard_pending_input()?;
        if dropped > 0 {
            tracing::debug!(dropped, "discarded keystrokes typed before onset");
        }
        self.engine.presented();
        Ok(true)
    }

    fn await_response(&mut self) -> Result<bool> {
        loop {
            let c = match self.screen.next_key()? {
                Key::Quit => return Ok(false),
                Key::Space => ' ',
                Key::Char(c) => c,
            };
            let mut buf = [0u8; 4];
            match self.engine.respond(c.encode_utf8(&mut buf))? {
                Response::Accepted(_) => return Ok(true),
                Response::Ignored(_) => {}
            }
        }
    }

    fn complete(&mut self) -> Result<bool> {
        if self.exported.is_none() {
            self.exported = Some(self.export()?);
        }
        let records = self.engine.records();
        let correct = records.iter().filter(|r| r.is_correct).count();
        let summary = format!("You answered {correct} of {} correctly.", records.len());
        let saved = match &self.exported {
            Some(path) => format!("Your results were saved to {}", path.display()),
            None => String::new(),
        };

        self.screen.enter_raw()?;
        self.screen.message(&[
            "Experiment complete! Thank you for participating!",
            "",
            &summary,
            &saved,
            "",
            "Press R to start over or Esc to quit.",
        ])?;
        loop {
            match self.screen.next_key()? {
                Key::Char('r') | Key::Char('R') => {
                    self.engine.restart();
                    self.exported = None;
                    self.screen.leave_raw()?;
                    return Ok(true);
                }
                Key::Quit | Key::Char('q') => return Ok(false),
                _ => {}
            }
        }
    }

    fn export(&self) -> Result<PathBuf> {
        let name = format!(
            "experiment_results_{}.csv",
            Local::now().format("%Y%m%d_%H%M%S")
        );
        let path = self.export_dir.join(name);
        export::write_csv(&path, self.engine.records())
            .with_context(|| format!("write export {}", path.display()))?;
        tracing::info!(path = %path.display(), records = self.engine.records().len(), "session exported");
        Ok(path)
    }
}
