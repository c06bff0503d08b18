use std::{path::PathBuf, thread, time::Duration};

use clap::Parser;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use moviebarcode::{Session, Strategy, Style};
use serde_json::json;

const CLI_AFTER_HELP: &str = "Examples:\n  moviebarcode input.mp4\n  moviebarcode input.mp4 --output barcode.png --width 1920 --height 200\n  moviebarcode input.mp4 --style horizontal,thumbnails,spectrogram\n  moviebarcode input.mp4 --start 0.25 --end 0.75 --strategy live --progress";

#[derive(Debug, Parser)]
#[command(
    name = "moviebarcode",
    version,
    about = "Render a video's timeline as a single still image",
    after_help = CLI_AFTER_HELP
)]
struct Cli {
    /// Input media path.
    input: PathBuf,

    /// Output image path (default: <input>.png).
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output width in pixels.
    #[arg(short, long, default_value_t = 1000)]
    width: u32,

    /// Output height in pixels.
    #[arg(short = 'H', long, default_value_t = 150)]
    height: u32,

    /// Comma-separated list of track styles, stacked top to bottom
    /// (horizontal, vertical, thumbnails, slitscan, middlecolumn,
    /// spectrogram).
    #[arg(short, long, default_value = "horizontal")]
    style: String,

    /// Decoding strategy (fast, exact, live).
    #[arg(long, default_value = "fast")]
    strategy: String,

    /// Start of the rendered range, as a fraction of total duration.
    #[arg(long, default_value_t = 0.0)]
    start: f64,

    /// End of the rendered range, as a fraction of total duration.
    #[arg(long, default_value_t = 1.0)]
    end: f64,

    /// Show a progress bar.
    #[arg(long)]
    progress: bool,

    /// Allow overwriting an existing output file.
    #[arg(long)]
    overwrite: bool,

    /// Show additional output.
    #[arg(long)]
    verbose: bool,

    /// Print a machine-readable JSON summary on completion.
    #[arg(long)]
    json: bool,
}

fn parse_styles(value: &str) -> Result<Vec<Style>, Box<dyn std::error::Error>> {
    let styles = value
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(str::parse)
        .collect::<Result<Vec<Style>, _>>()?;
    if styles.is_empty() {
        return Err("at least one style is required".into());
    }
    Ok(styles)
}

fn default_output(input: &PathBuf) -> PathBuf {
    let mut name = input.as_os_str().to_owned();
    name.push(".png");
    PathBuf::from(name)
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let styles = parse_styles(&cli.style)?;
    let strategy: Strategy = cli.strategy.parse()?;
    let output = cli.output.clone().unwrap_or_else(|| default_output(&cli.input));

    if output.exists() && !cli.overwrite {
        return Err(format!(
            "output already exists: {} (use --overwrite to replace)",
            output.display()
        )
        .into());
    }

    let mut session = Session::open(&cli.input, cli.width, cli.height)?;
    session.set_styles(&styles)?;
    session.set_strategy(strategy)?;
    if cli.start != 0.0 {
        session.set_start(cli.start)?;
    }
    if cli.end != 1.0 {
        session.set_end(cli.end)?;
    }

    if cli.verbose {
        eprintln!(
            "rendering {} as {}x{} [{}]",
            cli.input.display(),
            cli.width,
            cli.height,
            styles
                .iter()
                .map(|style| style.name())
                .collect::<Vec<_>>()
                .join("+"),
        );
    }

    let poller = if cli.progress {
        let handle = session.progress_handle();
        let bar = ProgressBar::new(100);
        let style =
            ProgressStyle::with_template("{spinner:.green} {bar:40.cyan/blue} {percent}%")?;
        bar.set_style(style.progress_chars("##-"));
        Some(thread::spawn(move || {
            loop {
                let value = handle.value();
                bar.set_position((value * 100.0) as u64);
                if value >= 1.0 {
                    break;
                }
                thread::sleep(Duration::from_millis(100));
            }
            bar.finish_and_clear();
        }))
    } else {
        None
    };

    let result = session.generate();
    if let Some(poller) = poller {
        let _ = poller.join();
    }
    result?;

    session.write(&output)?;

    if cli.json {
        let payload = json!({
            "input": cli.input,
            "output": output,
            "width": cli.width,
            "height": cli.height,
            "styles": styles.iter().map(|style| style.name()).collect::<Vec<_>>(),
            "strategy": strategy.name(),
            "start": cli.start,
            "end": cli.end,
        });
        println!("{}", serde_json::to_string_pretty(&payload)?);
    } else {
        println!("{} {}", "saved".green().bold(), output.display());
    }

    Ok(())
}

fn main() {
    if let Err(error) = run() {
        eprintln!("{} {error}", "error:".red().bold());
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::{default_output, parse_styles};
    use moviebarcode::Style;
    use std::path::PathBuf;

    #[test]
    fn parse_style_lists() {
        assert_eq!(parse_styles("horizontal").unwrap(), vec![Style::Horizontal]);
        assert_eq!(
            parse_styles("horizontal, thumbnails ,spectrogram").unwrap(),
            vec![Style::Horizontal, Style::Thumbnails, Style::Spectrogram]
        );
        assert!(parse_styles("nope").is_err());
        assert!(parse_styles("").is_err());
    }

    #[test]
    fn default_output_appends_png() {
        assert_eq!(
            default_output(&PathBuf::from("movie.mp4")),
            PathBuf::from("movie.mp4.png")
        );
    }
}
