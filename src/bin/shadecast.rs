use std::fs::File;
use std::io::{BufWriter, Read as _, Write};

use anyhow::{Context as _, bail};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use shadecast::{
    CancelToken, Geometry, Mapping, PatternRenderer, Pipeline, PipelineOpts,
    frame_limit_for_duration, interval_for_fps,
};

#[derive(Parser, Debug)]
#[command(name = "shadecast", version)]
struct Cli {
    /// Input shader file, or `-` for stdin.
    #[arg(short = 'i', long = "input", default_value = "-")]
    input: String,

    /// Output file, or `-` for stdout.
    #[arg(short = 'o', long = "output", default_value = "-")]
    output: String,

    /// Output dimensions as `WxH`, or `env` to read $LEDCAT_GEOMETRY.
    #[arg(short = 'g', long = "geometry", default_value = "env")]
    geometry: String,

    /// Output format. Detected from the output filename when omitted.
    #[arg(
        long = "ofmt",
        value_parser = clap::builder::PossibleValuesParser::new(shadecast::encode::FORMAT_NAMES.iter().copied()),
    )]
    ofmt: Option<String>,

    /// Frames per second. Omit to render a single frame.
    #[arg(short = 'f', long = "framerate")]
    framerate: Option<f64>,

    /// Stop after this many frames. Requires --framerate.
    #[arg(short = 'n', long = "num-frames", conflicts_with = "duration")]
    num_frames: Option<u64>,

    /// Stop after this many seconds of animation. Requires --framerate.
    #[arg(short = 'd', long = "duration")]
    duration: Option<u64>,

    /// Enable debug logging.
    #[arg(short = 'v', long = "verbose")]
    verbose: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    if cli.framerate.is_none() && (cli.num_frames.is_some() || cli.duration.is_some()) {
        bail!("--num-frames and --duration require --framerate");
    }

    let geometry = parse_geometry(&cli.geometry)?;
    let interval = cli.framerate.map(interval_for_fps).transpose()?;
    let frame_limit = match (cli.num_frames, cli.duration, cli.framerate) {
        (Some(n), _, _) => Some(n),
        (None, Some(secs), Some(fps)) => Some(frame_limit_for_duration(secs, fps)),
        _ => None,
    };

    let shader_source = read_input(&cli.input)?;
    let mappings = Mapping::extract(&shader_source)?;

    let format = match &cli.ofmt {
        Some(name) => shadecast::by_name(name)
            .with_context(|| format!("unknown output format '{name}'"))?,
        None if cli.output == "-" => bail!(
            "streaming to stdout requires --ofmt (the format cannot be detected)"
        ),
        None => shadecast::detect_format(&cli.output).with_context(|| {
            format!(
                "unable to detect the format of '{}', pass --ofmt",
                cli.output
            )
        })?,
    };

    let renderer = PatternRenderer::new(
        geometry,
        interval.unwrap_or_default(),
        &mappings,
    )?;

    let cancel = CancelToken::new();
    {
        let cancel = cancel.clone();
        ctrlc::set_handler(move || cancel.cancel())
            .context("unable to install the interrupt handler")?;
    }

    let mut sink = open_output(&cli.output)?;
    let mut pipeline = Pipeline::new(
        Box::new(renderer),
        format,
        PipelineOpts {
            interval,
            frame_limit,
        },
    );
    let stats = pipeline.run(&mut *sink, &cancel)?;
    sink.flush()?;
    pipeline.shutdown()?;

    tracing::debug!(
        rendered = stats.frames_rendered,
        encoded = stats.frames_encoded,
        "session finished"
    );
    Ok(())
}

fn parse_geometry(value: &str) -> anyhow::Result<Geometry> {
    let spec = if value == "env" {
        std::env::var("LEDCAT_GEOMETRY")
            .context("geometry is 'env' but $LEDCAT_GEOMETRY is not set")?
    } else {
        value.to_owned()
    };
    let (w, h) = spec
        .split_once('x')
        .with_context(|| format!("invalid geometry '{spec}', expected WxH"))?;
    let width = w
        .parse()
        .with_context(|| format!("invalid geometry width '{w}'"))?;
    let height = h
        .parse()
        .with_context(|| format!("invalid geometry height '{h}'"))?;
    Ok(Geometry::new(width, height)?)
}

fn read_input(path: &str) -> anyhow::Result<String> {
    if path == "-" {
        let mut source = String::new();
        std::io::stdin()
            .read_to_string(&mut source)
            .context("read shader from stdin")?;
        Ok(source)
    } else {
        std::fs::read_to_string(path).with_context(|| format!("read shader '{path}'"))
    }
}

fn open_output(path: &str) -> anyhow::Result<Box<dyn Write + Send>> {
    if path == "-" {
        Ok(Box::new(std::io::stdout()))
    } else {
        let file = File::create(path).with_context(|| format!("create output '{path}'"))?;
        Ok(Box::new(BufWriter::new(file)))
    }
}
