//! Opening the target named on the command line

use crate::cli::{BoundsArgs, TargetArgs};
use crate::source::{CoreDump, ElfSymbols, LiveProcess};

use anyhow::{bail, Result};
use heapscope::{
    analyze, analyze_bounds, AnalysisOptions, HeapAnalysis, HeapBounds, MemorySource,
};
use std::io::{IsTerminal, Write};
use std::path::PathBuf;

/// A memory source plus the symbol tables of its modules
pub struct Target {
    pub source: Box<dyn MemorySource>,
    pub symbols: ElfSymbols,
    pub description: String,
}

impl Target {
    pub fn open(args: &TargetArgs) -> Result<Self> {
        if let Some(path) = &args.dump {
            let dump = CoreDump::open(path, args.maps.as_deref())?;
            let symbols = ElfSymbols::from_regions(dump.regions(), args.sysroot.clone());
            let description = format!("core dump {}", dump.path.display());
            return Ok(Target {
                source: Box::new(dump),
                symbols,
                description,
            });
        }

        let process = match (args.pid, &args.name) {
            (Some(pid), _) => LiveProcess::attach(pid)?,
            (None, Some(name)) => LiveProcess::attach_by_name(name)?,
            (None, None) => bail!("No target given. Use --pid, --name or --dump."),
        };

        // Module paths are relative to the target's mount namespace
        let sysroot = args
            .sysroot
            .clone()
            .unwrap_or_else(|| PathBuf::from(format!("/proc/{}/root", process.pid)));
        let symbols = ElfSymbols::from_regions(process.regions(), Some(sysroot));
        let description = format!("PID {} ({})", process.pid, process.exe_path.display());

        Ok(Target {
            source: Box::new(process),
            symbols,
            description,
        })
    }

    /// Walk the heap, at explicit bounds if given
    pub fn analyze(&self, bounds: &BoundsArgs, options: &AnalysisOptions) -> Result<HeapAnalysis> {
        tracing::info!("Analyzing heap of {}", self.description);

        let mut progress = Progress::new();
        let analysis = match (bounds.start, bounds.end) {
            (Some(start), Some(end)) => analyze_bounds(
                self.source.as_ref(),
                HeapBounds::new(start, end),
                options,
                &mut |f| progress.update(f),
            )?,
            _ => analyze(
                self.source.as_ref(),
                &self.symbols,
                &self.symbols,
                options,
                &mut |f| progress.update(f),
            )?,
        };
        progress.finish();

        Ok(analysis)
    }
}

/// Percentage display on stderr, only when it is a terminal
struct Progress {
    enabled: bool,
    last: Option<u32>,
}

impl Progress {
    fn new() -> Self {
        Progress {
            enabled: std::io::stderr().is_terminal(),
            last: None,
        }
    }

    fn update(&mut self, fraction: f64) {
        let percent = (fraction.clamp(0.0, 1.0) * 100.0) as u32;
        if !self.enabled || self.last == Some(percent) {
            return;
        }
        self.last = Some(percent);
        let mut stderr = std::io::stderr();
        let _ = write!(stderr, "\rWalking heap: {:3}%", percent);
        let _ = stderr.flush();
    }

    fn finish(&self) {
        if self.enabled && self.last.is_some() {
            eprintln!();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_requires_a_target() {
        let err = Target::open(&TargetArgs::default()).err().unwrap();
        assert!(err.to_string().contains("--pid"));
    }

    #[test]
    fn test_open_missing_dump() {
        let args = TargetArgs {
            dump: Some(PathBuf::from("/nonexistent/core")),
            ..Default::default()
        };
        assert!(Target::open(&args).is_err());
    }

    #[test]
    fn test_progress_deduplicates() {
        let mut progress = Progress {
            enabled: false,
            last: None,
        };
        progress.update(0.5);
        assert_eq!(progress.last, None);

        progress.enabled = true;
        progress.update(0.501);
        progress.update(0.504);
        assert_eq!(progress.last, Some(50));
        progress.update(1.5);
        assert_eq!(progress.last, Some(100));
    }
}
