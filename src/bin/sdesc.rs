//! sdesc - scene-description CLI tool
//!
//! Stitch serialized layers together, dump a layer's specs, and inspect
//! composed prim definitions built from schema plugin files.

use std::fs;
use std::io::{self, Write};
use std::path::{Path as FsPath, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use scene_description::layer::Layer;
use scene_description::schema::{SchemaPlugin, SchemaRegistry};
use scene_description::spec::Specifier;

#[derive(Debug, Parser)]
#[command(name = "sdesc", version, about = "Scene-description layer and schema tool")]
struct Cli {
    /// Output location. Use '-' for stdout.
    #[arg(short, long, default_value = "-")]
    output: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Merge a weak layer into a strong one and write the result.
    Stitch {
        #[arg(long)]
        strong: PathBuf,
        #[arg(long)]
        weak: PathBuf,
        /// Skip all time-sample merging.
        #[arg(long)]
        ignore_time_samples: bool,
    },
    /// Print the specs and fields of a layer file.
    Dump { file: PathBuf },
    /// Build a prim definition from schema plugin files and print it.
    PrimDef {
        /// Schema plugin metadata files (JSON), in load order.
        #[arg(long = "plugin", required = true)]
        plugins: Vec<PathBuf>,
        /// Concrete schema type name.
        #[arg(long = "type")]
        type_name: String,
        /// Applied API schemas, strongest first.
        #[arg(long = "apply")]
        api_schemas: Vec<String>,
        /// Flatten the composed definition to a layer instead of listing it.
        #[arg(long)]
        flatten: bool,
    },
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let mut output: Box<dyn Write> = if cli.output == "-" {
        Box::new(io::stdout())
    } else {
        Box::new(
            fs::File::create(&cli.output)
                .map_err(|e| format!("Failed to create output file {:?}: {}", cli.output, e))?,
        )
    };

    match cli.command {
        Command::Stitch {
            strong,
            weak,
            ignore_time_samples,
        } => {
            let strong_layer = read_layer(&strong)?;
            let weak_layer = read_layer(&weak)?;
            scene_description::stitch::stitch_layers(
                &strong_layer,
                &weak_layer,
                ignore_time_samples,
            );
            write!(output, "{}", serialize_layer(&strong_layer, &strong)?)?;
        }
        Command::Dump { file } => {
            let layer = read_layer(&file)?;
            dump(&layer, &mut output)?;
        }
        Command::PrimDef {
            plugins,
            type_name,
            api_schemas,
            flatten,
        } => {
            prim_def(&plugins, &type_name, &api_schemas, flatten, &mut output)?;
        }
    }

    Ok(())
}

fn is_yaml(path: &FsPath) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml") | Some("yml")
    )
}

fn read_layer(path: &FsPath) -> Result<Layer, Box<dyn std::error::Error>> {
    let content = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read layer file {:?}: {}", path, e))?;
    let layer = if is_yaml(path) {
        Layer::from_yaml(&content)
    } else {
        Layer::from_json(&content)
    };
    Ok(layer.map_err(|e| format!("Failed to parse layer {:?}: {}", path, e))?)
}

fn serialize_layer(layer: &Layer, like: &FsPath) -> Result<String, Box<dyn std::error::Error>> {
    let text = if is_yaml(like) {
        layer.to_yaml()?
    } else {
        layer.to_json()?
    };
    Ok(text)
}

fn dump(layer: &Layer, output: &mut dyn Write) -> Result<(), Box<dyn std::error::Error>> {
    writeln!(output, "layer {}", layer.identifier())?;
    for path in layer.spec_paths() {
        let Some(data) = layer.spec_data(&path) else {
            continue;
        };
        writeln!(output, "<{}> ({:?})", path, data.spec_type)?;
        for (field, value) in &data.fields {
            writeln!(output, "    {} = {:?}", field, value)?;
        }
    }
    Ok(())
}

fn prim_def(
    plugin_files: &[PathBuf],
    type_name: &str,
    api_schemas: &[String],
    flatten: bool,
    output: &mut dyn Write,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut plugins = Vec::with_capacity(plugin_files.len());
    for file in plugin_files {
        let content = fs::read_to_string(file)
            .map_err(|e| format!("Failed to read plugin file {:?}: {}", file, e))?;
        let plugin: SchemaPlugin = serde_json::from_str(&content)
            .map_err(|e| format!("Failed to parse plugin {:?}: {}", file, e))?;
        plugins.push(plugin);
    }
    let registry = SchemaRegistry::new(&plugins);

    let composed;
    let def = if api_schemas.is_empty() {
        registry
            .find_concrete_prim_definition(type_name)
            .ok_or_else(|| format!("No concrete schema type named '{}'", type_name))?
    } else {
        composed = registry
            .build_composed_prim_definition(type_name, api_schemas)
            .ok_or_else(|| format!("Failed to compose prim definition for '{}'", type_name))?;
        &composed
    };

    if flatten {
        let layer = Layer::create_anonymous(type_name);
        let path = scene_description::path::Path::absolute_root().append_child("Flattened");
        if !def.flatten_to(&layer, &path, Specifier::Def) {
            return Err("Failed to flatten prim definition".into());
        }
        write!(output, "{}", layer.to_json()?)?;
        return Ok(());
    }

    writeln!(output, "prim definition {}", type_name)?;
    if !def.applied_api_schemas().is_empty() {
        writeln!(output, "  applied: {}", def.applied_api_schemas().join(", "))?;
    }
    for name in def.property_names() {
        match def.property_field(name, scene_description::layer::fields::DEFAULT) {
            Some(default) => writeln!(output, "  {} = {:?}", name, default)?,
            None => writeln!(output, "  {}", name)?,
        }
    }
    Ok(())
}
