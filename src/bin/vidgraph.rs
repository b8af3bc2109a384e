use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};
use vidgraph::foundation::paths;
use vidgraph::{
    Context, EngineConfig, FrameConsumer, Model, ModelDef, NodeRegistry, Output, Size, TextureId,
};

#[derive(Parser, Debug)]
#[command(name = "vidgraph", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Render frames of one output as PNGs.
    Render(RenderArgs),
    /// Print a project's nodes, routes and render order.
    Inspect(InspectArgs),
}

#[derive(Parser, Debug)]
struct RenderArgs {
    /// Project topology JSON.
    #[arg(long)]
    project: PathBuf,

    /// Output route to render.
    #[arg(long, default_value = "main")]
    output: String,

    /// Output resolution, e.g. 1920x1080.
    #[arg(long, default_value = "640x360")]
    size: Size,

    /// Number of frames to render.
    #[arg(long, default_value_t = 1)]
    frames: u32,

    /// Pause between frames so media sources advance.
    #[arg(long, default_value_t = 40)]
    interval_ms: u64,

    /// Directory receiving `<output>-<frame>.png`.
    #[arg(long)]
    out_dir: PathBuf,

    /// Engine configuration JSON.
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Parser, Debug)]
struct InspectArgs {
    /// Project topology JSON.
    #[arg(long)]
    project: PathBuf,

    /// Engine configuration JSON.
    #[arg(long)]
    config: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    match cli.cmd {
        Command::Render(args) => cmd_render(args),
        Command::Inspect(args) => cmd_inspect(args),
    }
}

fn load_config(path: Option<&Path>) -> anyhow::Result<EngineConfig> {
    let cfg = match path {
        Some(p) => EngineConfig::from_path(p)
            .with_context(|| format!("load config '{}'", p.display()))?,
        None => EngineConfig::default(),
    };
    paths::initialize(cfg.debug_paths);
    Ok(cfg)
}

fn load_model(project: &Path, cfg: &EngineConfig) -> anyhow::Result<Model> {
    let def = ModelDef::from_path(project)
        .with_context(|| format!("load project '{}'", project.display()))?;
    let registry = NodeRegistry::with_builtins(&cfg.media);
    Model::from_def(&def, &registry).with_context(|| format!("build graph '{}'", project.display()))
}

struct PngWriter {
    dir: PathBuf,
    frame: std::sync::atomic::AtomicU32,
    written: std::sync::Mutex<Vec<PathBuf>>,
}

impl PngWriter {
    fn write(&self, output: &Output, texture: TextureId) -> anyhow::Result<Option<PathBuf>> {
        let index = self.frame.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        let Some(frame) = output.chain().gpu().read_pixels(texture) else {
            return Ok(None);
        };
        let path = self.dir.join(format!("{}-{index:05}.png", output.name()));
        frame
            .to_rgba_image()?
            .save_with_format(&path, image::ImageFormat::Png)
            .with_context(|| format!("write png '{}'", path.display()))?;
        Ok(Some(path))
    }
}

impl FrameConsumer for PngWriter {
    fn render_ready(&self, output: &Output, texture: TextureId) {
        match self.write(output, texture) {
            Ok(Some(path)) => self
                .written
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .push(path),
            Ok(None) => tracing::warn!(output = output.name(), "output rendered nothing"),
            Err(e) => tracing::error!(error = %e, "png write failed"),
        }
    }
}

fn cmd_render(args: RenderArgs) -> anyhow::Result<()> {
    let cfg = load_config(args.config.as_deref())?;
    let model = Arc::new(load_model(&args.project, &cfg)?);
    if model.output_route(&args.output).is_none() {
        anyhow::bail!("project has no output route '{}'", args.output);
    }

    std::fs::create_dir_all(&args.out_dir)
        .with_context(|| format!("create output dir '{}'", args.out_dir.display()))?;

    let mut ctx = Context::from_config(&EngineConfig {
        preview: false,
        ..cfg.clone()
    });
    let output = ctx.create_output(args.output.clone(), args.size)?;
    let writer = Arc::new(PngWriter {
        dir: args.out_dir.clone(),
        frame: std::sync::atomic::AtomicU32::new(0),
        written: std::sync::Mutex::new(Vec::new()),
    });
    let consumer: Arc<dyn FrameConsumer> = writer.clone();
    output.set_consumer(Some(consumer));
    ctx.set_model(Some(Arc::clone(&model)));
    ctx.set_outputs(vec![Arc::clone(&output)]);

    for i in 0..args.frames {
        if i > 0 {
            std::thread::sleep(Duration::from_millis(args.interval_ms));
        }
        ctx.process_events();
        output.request_render()?;
    }

    let written = writer.written.lock().unwrap_or_else(|e| e.into_inner()).len();
    eprintln!(
        "wrote {written} of {} frame(s) to {}",
        args.frames,
        args.out_dir.display()
    );
    Ok(())
}

fn cmd_inspect(args: InspectArgs) -> anyhow::Result<()> {
    let cfg = load_config(args.config.as_deref())?;
    let model = load_model(&args.project, &cfg)?;
    let def = model.to_def();

    println!("nodes:");
    for n in &def.nodes {
        println!("  {} {} {}", n.id, n.kind, n.params);
    }
    println!("edges:");
    for e in &def.edges {
        println!("  {} -> {}[{}]", e.from, e.to, e.slot);
    }
    println!("outputs:");
    for (name, node) in &def.outputs {
        println!("  {name} <- {node}");
    }

    let (order, blocked) = model.render_order();
    let fmt = |ids: &[vidgraph::NodeId]| {
        ids.iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(" ")
    };
    println!("render order: {}", fmt(&order[..]));
    if !blocked.is_empty() {
        println!("blocked by cycle: {}", fmt(&blocked[..]));
    }
    println!("library: {}", paths::library().display());
    Ok(())
}
