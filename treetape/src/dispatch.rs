// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::{
    ExpectedError, Result,
    exit_codes::TreeTapeExitCode,
    output::{OutputContext, OutputOpts},
};
use camino::{Utf8Path, Utf8PathBuf};
use clap::{Args, Parser, ValueEnum};
use futures::{Stream, StreamExt, future, stream};
use std::io::{self, Write};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_stream::wrappers::LinesStream;
use tracing::{debug, info, warn};
use treetape_runner::{
    config::{HarnessOption, RunConfig},
    loader::{FileDescriptor, SuiteLoader},
    reporter::{MessageFormat, TestReporterBuilder},
    runner::TreeRunner,
};

/// Runs tape-style test trees.
///
/// Test binaries call into this with the suites they define. Suites run one at a time, and the
/// run stops at the first suite with a failing test.
#[derive(Debug, Parser)]
#[command(version, styles = crate::output::clap_styles::style())]
pub struct TreeTapeApp {
    /// Only run suites whose path contains one of these filters [default: every suite the
    /// binary defines]
    ///
    /// With `--exact`, a suite's path must match a filter exactly.
    #[arg(value_name = "FILTERS", conflicts_with = "stdin")]
    filters: Vec<String>,

    /// Read suite paths from standard input, one per line, instead of running the binary's suites
    #[arg(long)]
    stdin: bool,

    /// List the suites this binary defines instead of running them
    #[arg(long, conflicts_with = "stdin")]
    list: bool,

    #[clap(flatten)]
    config_opts: ConfigOpts,

    #[clap(flatten)]
    reporter_opts: ReporterOpts,

    #[clap(flatten)]
    output: OutputOpts,

    #[clap(flatten)]
    libtest: LibtestCompatOpts,
}

impl TreeTapeApp {
    /// Initializes logging and color support.
    pub fn init_output(&self) -> OutputContext {
        self.output.init()
    }

    /// Executes the app against the suites in `loader`, returning the process exit code.
    pub fn exec<L: SuiteLoader>(self, loader: L, output: OutputContext) -> Result<i32> {
        self.libtest.log_ignored();

        if self.list {
            return self.exec_list(&loader);
        }
        if self.libtest.ignored {
            info!("treetape suites have no ignored tests, nothing to run");
            return Ok(TreeTapeExitCode::OK);
        }

        let root = current_dir()?;
        let config = self.config_opts.make_config(&root)?;
        let reporter = TestReporterBuilder::default()
            .set_colorize(output.color.should_colorize(supports_color::Stream::Stdout))
            .set_unicode(supports_unicode::on(supports_unicode::Stream::Stdout))
            .set_message_format(self.reporter_opts.message_format.into())
            .build(io::stdout());

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .map_err(ExpectedError::runtime_build_failed)?;

        let suites = (!self.stdin).then(|| self.select_suites(loader.default_suites()));
        let mut runner = TreeRunner::new(loader, config, reporter);
        let stats = runtime.block_on(async move {
            match suites {
                Some(suites) => {
                    debug!(count = suites.len(), "running suites");
                    runner.run_to_completion(stream::iter(suites)).await
                }
                None => runner.run_to_completion(stdin_descriptors()).await,
            }
        })?;

        debug!(?stats, "run finished");
        Ok(TreeTapeExitCode::OK)
    }

    fn exec_list<L: SuiteLoader>(&self, loader: &L) -> Result<i32> {
        if self.libtest.ignored {
            return Ok(TreeTapeExitCode::OK);
        }

        let mut stdout = io::stdout().lock();
        for suite in self.select_suites(loader.default_suites()) {
            writeln!(stdout, "{suite}: test")
                .map_err(|err| ExpectedError::WriteReportError { err })?;
        }
        Ok(TreeTapeExitCode::OK)
    }

    /// Applies the positional filters to `suites`, the way libtest applies them to test names.
    fn select_suites(&self, suites: Vec<FileDescriptor>) -> Vec<FileDescriptor> {
        if self.filters.is_empty() {
            return suites;
        }

        let selected: Vec<_> = suites
            .into_iter()
            .filter(|suite| {
                let path = suite.path().as_str();
                self.filters.iter().any(|filter| {
                    if self.libtest.exact {
                        path == filter.as_str()
                    } else {
                        path.contains(filter.as_str())
                    }
                })
            })
            .collect();
        if selected.is_empty() {
            info!(filters = ?self.filters, "no suites match the given filters");
        }
        selected
    }
}

#[derive(Debug, Args)]
#[command(next_help_heading = "Config options")]
struct ConfigOpts {
    /// Config file [default: .config/treetape.toml in the current directory]
    #[arg(long, value_name = "PATH")]
    config_file: Option<Utf8PathBuf>,

    /// Only run tests whose name starts with `test`
    #[arg(long)]
    test_only: bool,

    /// Set a harness option, overriding the config file
    ///
    /// The value is parsed as JSON, or taken as a string if that fails. May be repeated.
    #[arg(long = "harness-option", short = 'O', value_name = "KEY=VALUE")]
    harness_options: Vec<HarnessOption>,
}

impl ConfigOpts {
    fn make_config(&self, root: &Utf8Path) -> Result<RunConfig> {
        let mut config = RunConfig::from_sources(root, self.config_file.as_deref())?;
        if self.test_only {
            config.set_test_only(true);
        }
        for option in &self.harness_options {
            config.set_harness_option(option.clone());
        }
        Ok(config)
    }
}

#[derive(Debug, Args)]
#[command(next_help_heading = "Reporter options")]
struct ReporterOpts {
    /// Output format
    #[arg(long, value_enum, default_value_t, value_name = "FMT")]
    message_format: MessageFormatOpts,
}

#[derive(Copy, Clone, Debug, Default, ValueEnum)]
enum MessageFormatOpts {
    /// A line per test and assertion, then a line per suite
    #[default]
    Human,

    /// A JSON report per suite, one per line
    Json,
}

impl From<MessageFormatOpts> for MessageFormat {
    fn from(format: MessageFormatOpts) -> Self {
        match format {
            MessageFormatOpts::Human => Self::Human,
            MessageFormatOpts::Json => Self::Json,
        }
    }
}

/// Arguments that `cargo test` and nextest pass to test binaries.
#[derive(Debug, Args)]
struct LibtestCompatOpts {
    #[arg(long, hide = true)]
    nocapture: bool,

    #[arg(long, hide = true)]
    exact: bool,

    #[arg(long, hide = true)]
    ignored: bool,

    #[arg(long, hide = true)]
    include_ignored: bool,

    #[arg(long, hide = true)]
    show_output: bool,

    #[arg(long, hide = true, value_name = "N")]
    test_threads: Option<String>,

    #[arg(long, hide = true, value_name = "FMT")]
    format: Option<String>,
}

impl LibtestCompatOpts {
    fn log_ignored(&self) {
        let Self {
            nocapture,
            exact,
            ignored,
            include_ignored,
            show_output,
            test_threads,
            format,
        } = self;
        debug!(
            nocapture,
            exact,
            ignored,
            include_ignored,
            show_output,
            ?test_threads,
            ?format,
            "libtest arguments",
        );
    }
}

fn current_dir() -> Result<Utf8PathBuf> {
    let dir = std::env::current_dir().map_err(ExpectedError::current_dir_failed)?;
    Utf8PathBuf::try_from(dir)
        .map_err(|err| ExpectedError::current_dir_invalid_utf8(err.into_path_buf()))
}

/// Reads suite paths from stdin, one per line. Blank lines are skipped, and the stream ends at
/// the first read error.
fn stdin_descriptors() -> impl Stream<Item = FileDescriptor> {
    LinesStream::new(BufReader::new(tokio::io::stdin()).lines())
        .scan((), |_, line| {
            future::ready(match line {
                Ok(line) => Some(line),
                Err(error) => {
                    warn!(%error, "failed to read suite paths from stdin");
                    None
                }
            })
        })
        .filter_map(|line| {
            let path = line.trim();
            future::ready((!path.is_empty()).then(|| FileDescriptor::new(path)))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::Color;
    use camino_tempfile::tempdir;
    use clap::{CommandFactory, error::ErrorKind};
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use treetape_runner::{loader::SuiteRegistry, tree::TestTree};

    fn parse(args: &str) -> std::result::Result<TreeTapeApp, clap::Error> {
        TreeTapeApp::try_parse_from(shell_words::split(args).expect("valid command line"))
    }

    #[test]
    fn verify_app() {
        TreeTapeApp::command().debug_assert();
    }

    #[test]
    fn test_argument_parsing() {
        let valid: &[&'static str] = &[
            "treetape",
            "treetape suites/a.rs suites/b.rs",
            "treetape arith",
            "treetape --stdin",
            "treetape --test-only -O timeout=500 -O skip=false",
            "treetape --harness-option label=slow",
            "treetape --config-file custom.toml --message-format json",
            "treetape --color never -v",
            "treetape --list",
            // Arguments passed by cargo test and nextest.
            "treetape --nocapture --test-threads 1",
            "treetape --list --format terse --ignored",
            "treetape suites/a.rs --exact --nocapture",
        ];

        let invalid: &[(&'static str, ErrorKind)] = &[
            ("treetape --stdin suites/a.rs", ErrorKind::ArgumentConflict),
            ("treetape --list --stdin", ErrorKind::ArgumentConflict),
            ("treetape -O timeout", ErrorKind::ValueValidation),
            ("treetape -O =5", ErrorKind::ValueValidation),
            ("treetape --message-format xml", ErrorKind::InvalidValue),
            ("treetape --color sometimes", ErrorKind::InvalidValue),
        ];

        for valid_args in valid {
            if let Err(error) = parse(valid_args) {
                panic!("{valid_args} should have successfully parsed, but didn't: {error}");
            }
        }

        for &(invalid_args, kind) in invalid {
            match parse(invalid_args) {
                Ok(_) => {
                    panic!("{invalid_args} should have errored out but successfully parsed");
                }
                Err(error) => {
                    let actual_kind = error.kind();
                    if kind != actual_kind {
                        panic!(
                            "{invalid_args} should error with kind {kind:?}, but actual kind was {actual_kind:?}",
                        );
                    }
                }
            }
        }
    }

    #[test]
    fn command_line_overrides_config() {
        let dir = tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join(".config")).unwrap();
        std::fs::write(
            dir.path().join(RunConfig::CONFIG_PATH),
            "[harness]\ntimeout = 100\nlabel = \"file\"\n",
        )
        .unwrap();

        let app = parse("treetape --test-only -O timeout=500").unwrap();
        let config = app.config_opts.make_config(dir.path()).unwrap();
        assert!(config.test_only());
        assert_eq!(config.harness_options().get("timeout"), Some(&json!(500)));
        assert_eq!(config.harness_options().get("label"), Some(&json!("file")));
    }

    fn two_suites() -> SuiteRegistry {
        SuiteRegistry::new()
            .register("suites/arithmetic.rs", || {
                TestTree::new().test("test_add", |t| async move {
                    t.equal(1 + 1, 2, "adds");
                    t.done();
                    Ok(())
                })
            })
            .register("suites/timing.rs", || {
                TestTree::new().test("test_broken", |t| async move {
                    t.fail("always fails");
                    t.done();
                    Ok(())
                })
            })
    }

    fn selected(args: &str) -> Vec<String> {
        parse(args)
            .unwrap()
            .select_suites(two_suites().default_suites())
            .iter()
            .map(|suite| suite.path().to_string())
            .collect()
    }

    #[test]
    fn filters_select_suites() {
        assert_eq!(
            selected("treetape"),
            ["suites/arithmetic.rs", "suites/timing.rs"]
        );
        assert_eq!(selected("treetape arith"), ["suites/arithmetic.rs"]);
        assert_eq!(
            selected("treetape arith timing"),
            ["suites/arithmetic.rs", "suites/timing.rs"]
        );
        assert_eq!(
            selected("treetape --exact suites/timing.rs"),
            ["suites/timing.rs"]
        );
        assert_eq!(selected("treetape --exact timing"), Vec::<String>::new());
        assert_eq!(selected("treetape some_test_name"), Vec::<String>::new());
    }

    #[test]
    fn unmatched_filter_runs_nothing() {
        let output = OutputContext {
            color: Color::Never,
        };

        // The only failing suite is filtered out, so the run succeeds.
        let app = parse("treetape some_test_name --nocapture").unwrap();
        assert_eq!(
            app.exec(two_suites(), output).unwrap(),
            TreeTapeExitCode::OK
        );

        let app = parse("treetape arith").unwrap();
        assert_eq!(
            app.exec(two_suites(), output).unwrap(),
            TreeTapeExitCode::OK
        );

        let app = parse("treetape timing").unwrap();
        let error = app.exec(two_suites(), output).unwrap_err();
        assert_eq!(error.process_exit_code(), TreeTapeExitCode::TEST_RUN_FAILED);
    }

    #[test]
    fn message_format() {
        let app = parse("treetape --message-format json").unwrap();
        assert_eq!(
            MessageFormat::from(app.reporter_opts.message_format),
            MessageFormat::Json
        );
        let app = parse("treetape").unwrap();
        assert_eq!(
            MessageFormat::from(app.reporter_opts.message_format),
            MessageFormat::Human
        );
    }
}
