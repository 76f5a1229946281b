use std::path::PathBuf;

use anyhow::{anyhow, Context};
use clap::{Parser, Subcommand};

use thread_translations::forum::{load_translations, ForumId, TranslatedThread};
use thread_translations::pipeline::{
    init_default_config, translations_path, PipelineConfig, ThreadTranslator, TranslateOverrides,
};
use thread_translations::progress::ConsoleProgress;
use thread_translations::viewer::{
    render_html, render_text, render_usage_table, summarize_usage, thread_option_label,
    HtmlOptions, TextOptions, DEFAULT_WIDTH,
};

#[derive(Parser, Debug)]
#[command(name = "thread-translations")]
#[command(about = "Translate forum threads with several LLM backends and compare the results side by side", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Write a default config and prompt file, then exit
    InitConfig {
        /// Directory to write into (default: current directory)
        #[arg(long, value_name = "DIR")]
        dir: Option<PathBuf>,

        /// Overwrite existing files
        #[arg(long)]
        force: bool,
    },

    /// Sample untranslated threads and translate them with every configured model
    Translate {
        /// Config file path (default: search for thread-translations.toml upwards)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Forum dump file; repeat for several
        #[arg(long = "input", value_name = "JSON")]
        inputs: Vec<PathBuf>,

        /// Translations file to append to
        #[arg(short, long, value_name = "JSON")]
        output: Option<PathBuf>,

        /// Comma-separated backend names from config
        #[arg(long, value_delimiter = ',')]
        models: Vec<String>,

        /// Number of threads to translate this run
        #[arg(long = "sample")]
        sample_size: Option<usize>,

        /// Seed for reproducible sampling
        #[arg(long)]
        seed: Option<u64>,

        #[arg(long)]
        min_posts: Option<usize>,

        #[arg(long)]
        max_posts: Option<usize>,

        /// Re-translate failed or missing entries instead of sampling new threads
        #[arg(long)]
        retry_failed: bool,

        /// Ignore the translation cache
        #[arg(long)]
        no_cache: bool,

        /// No progress output
        #[arg(short, long)]
        quiet: bool,
    },

    /// List translated threads
    List {
        #[arg(long, value_name = "JSON")]
        translations: Option<PathBuf>,
    },

    /// Print one thread side by side in the terminal
    Show {
        #[arg(value_name = "THREAD_ID")]
        thread_id: String,

        #[arg(long, value_name = "JSON")]
        translations: Option<PathBuf>,

        /// Total line width
        #[arg(long, default_value_t = DEFAULT_WIDTH)]
        width: usize,

        /// Show model names instead of "Model A", "Model B", ...
        #[arg(long)]
        reveal_models: bool,
    },

    /// Write a self-contained HTML page for browsing all threads
    Render {
        #[arg(long, value_name = "JSON")]
        translations: Option<PathBuf>,

        #[arg(short, long, value_name = "HTML", default_value = "translations.html")]
        output: PathBuf,

        #[arg(long)]
        reveal_models: bool,
    },

    /// Token usage per model
    Usage {
        #[arg(long, value_name = "JSON")]
        translations: Option<PathBuf>,
    },
}

fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let args = Args::parse();

    match args.command {
        Command::InitConfig { dir, force } => {
            let dir = dir
                .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));
            let cfg_path = init_default_config(&dir, force).context("init default config")?;
            eprintln!("Wrote config: {}", cfg_path.display());
        }
        Command::Translate {
            config,
            inputs,
            output,
            models,
            sample_size,
            seed,
            min_posts,
            max_posts,
            retry_failed,
            no_cache,
            quiet,
        } => {
            let progress = ConsoleProgress::new(!quiet);
            let cfg = PipelineConfig::from_args(TranslateOverrides {
                config,
                inputs,
                output,
                models,
                sample_size,
                seed,
                min_posts,
                max_posts,
                retry_failed,
                no_cache,
            })
            .context("build config")?;
            if let Some(p) = cfg.config_path.as_ref() {
                progress.info(format!("Config: {}", p.display()));
            }
            let mut translator = ThreadTranslator::from_config(cfg, progress)?;
            let summary = translator.run()?;
            eprintln!(
                "Done: {} threads, {} API calls, {} cache hits, {} failures",
                summary.translated_threads, summary.calls, summary.cache_hits, summary.failures
            );
        }
        Command::List { translations } => {
            let threads = load_for_viewer(translations)?;
            for t in &threads {
                let marker = if t.has_failures() { "  [failures]" } else { "" };
                println!("{} ({} posts){marker}", thread_option_label(t), t.posts.len());
            }
        }
        Command::Show {
            thread_id,
            translations,
            width,
            reveal_models,
        } => {
            let threads = load_for_viewer(translations)?;
            let wanted = ForumId::parse(&thread_id);
            let thread = threads
                .iter()
                .find(|t| t.id == wanted || t.id.to_string() == thread_id.trim())
                .ok_or_else(|| anyhow!("thread not found: {thread_id}"))?;
            print!(
                "{}",
                render_text(
                    thread,
                    &TextOptions {
                        width,
                        reveal_models
                    }
                )
            );
        }
        Command::Render {
            translations,
            output,
            reveal_models,
        } => {
            let threads = load_for_viewer(translations)?;
            let html = render_html(&threads, &HtmlOptions { reveal_models });
            std::fs::write(&output, html)
                .with_context(|| format!("write html: {}", output.display()))?;
            eprintln!("Wrote {} threads to {}", threads.len(), output.display());
        }
        Command::Usage { translations } => {
            let threads = load_for_viewer(translations)?;
            print!("{}", render_usage_table(&summarize_usage(&threads)));
        }
    }
    Ok(())
}

fn load_for_viewer(explicit: Option<PathBuf>) -> anyhow::Result<Vec<TranslatedThread>> {
    let path = translations_path(explicit)?;
    load_translations(&path).with_context(|| format!("load translations: {}", path.display()))
}
