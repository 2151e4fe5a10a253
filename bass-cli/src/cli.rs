use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "bass", about = "Live tuner, chord and tempo readout for bass practice")]
pub struct Cli {
    /// Analyse an audio file (WAV, MP3, FLAC, OGG) instead of the default input device
    #[arg(short, long)]
    pub file: Option<PathBuf>,

    /// Feed the file as fast as possible instead of in real time
    #[arg(long, requires = "file")]
    pub fast: bool,

    /// Samples per analysis window
    #[arg(short, long, default_value_t = 2048)]
    pub buffer_size: usize,

    /// Tune against this open string (e.g. E1, A1) instead of the nearest note
    #[arg(short, long)]
    pub string: Option<String>,

    /// Number of strings on the bass (4 or 5), used to name the nearest string
    #[arg(long, default_value_t = 4)]
    pub strings: usize,

    /// Print one JSON object per analysis tick
    #[arg(long)]
    pub json: bool,

    /// Stop after this many seconds
    #[arg(short, long)]
    pub duration: Option<f64>,

    /// Analysis config file (TOML)
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}
