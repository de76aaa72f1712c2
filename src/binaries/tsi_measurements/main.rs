use anyhow::Context;
use clap::{Parser, Subcommand};
use influxdb_tsdb::index::tsi1::{
    MeasurementBlock, MeasurementBlockWriter, MEASUREMENT_LOAD_FACTOR,
};
use serde::Deserialize;
use serde::Serialize;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Parser)]
#[clap(about, version, author)]
struct Config {
    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Subcommand)]
enum Command {
    /// Build a measurement block from a JSON array of measurements.
    Build {
        #[clap(long)]
        input: String,
        #[clap(long)]
        output: String,
        #[clap(long, default_value_t = MEASUREMENT_LOAD_FACTOR)]
        load_factor: u64,
    },
    /// Print every element of a measurement block in hash slot order.
    Dump {
        #[clap(long)]
        path: String,
    },
    /// Look up a single measurement.
    Get {
        #[clap(long)]
        path: String,
        #[clap(long)]
        name: String,
    },
}

/// One measurement of the `build` input file.
#[derive(Debug, Deserialize)]
struct MeasurementInput {
    name: String,
    #[serde(default)]
    offset: u64,
    #[serde(default)]
    series_ids: Vec<u32>,
    #[serde(default)]
    deleted: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = Config::parse();
    match config.command {
        Command::Build {
            input,
            output,
            load_factor,
        } => build(&input, &output, load_factor).await,
        Command::Dump { path } => dump(&path).await,
        Command::Get { path, name } => get(&path, &name).await,
    }
}

async fn build(input: &str, output: &str, load_factor: u64) -> anyhow::Result<()> {
    let data = tokio::fs::read(input)
        .await
        .with_context(|| format!("read {}", input))?;
    let mms: Vec<MeasurementInput> = serde_json::from_slice(&data)?;

    let mut mw = MeasurementBlockWriter::with_load_factor(load_factor);
    for mm in mms {
        if mm.deleted {
            mw.delete(mm.name.as_bytes());
        } else {
            mw.add(mm.name.as_bytes(), mm.offset, mm.series_ids);
        }
    }

    let buf = mw.serialize()?;
    tokio::fs::write(output, &buf)
        .await
        .with_context(|| format!("write {}", output))?;
    println!("{} measurements, {} bytes -> {}", mw.len(), buf.len(), output);

    Ok(())
}

async fn open(path: &str) -> anyhow::Result<MeasurementBlock> {
    let data = tokio::fs::read(path)
        .await
        .with_context(|| format!("read {}", path))?;
    let blk = MeasurementBlock::load(data).with_context(|| format!("load {}", path))?;
    Ok(blk)
}

async fn dump(path: &str) -> anyhow::Result<()> {
    let blk = open(path).await?;
    println!(
        "version: {}, capacity: {}, size: {}",
        blk.version(),
        blk.capacity(),
        blk.len()
    );

    for (i, e) in blk.iter().enumerate() {
        println!("{:06}>{:?}", i, e?);
    }

    Ok(())
}

async fn get(path: &str, name: &str) -> anyhow::Result<()> {
    let blk = open(path).await?;
    match blk.elem(name.as_bytes())? {
        Some(e) => println!("{:?}", e),
        None => println!("measurement not found: {}", name),
    }

    Ok(())
}
