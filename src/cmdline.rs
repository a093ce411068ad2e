//! Command line parsing for the dflowmap compiler.
use argh::FromArgs;
use dflowmap_utils::OutputFile;
use std::path::PathBuf;

#[derive(FromArgs)]
#[argh(help_triggers("-h", "--help"))]
/// Lower dataflow processes to a costed asynchronous circuit netlist.
pub struct Opts {
    /// input file, `-` or absent for stdin
    #[argh(positional)]
    pub file: Option<PathBuf>,

    /// netlist output, default is stdout
    #[argh(
        option,
        short = 'o',
        long = "output",
        default = "OutputFile::Stdout"
    )]
    pub output: OutputFile,

    /// template library output
    #[argh(option, long = "lib", default = "OutputFile::Null")]
    pub lib: OutputFile,

    /// cost configuration output
    #[argh(option, long = "conf", default = "OutputFile::Null")]
    pub conf: OutputFile,

    /// standard metrics file. May be repeated; later files override
    /// earlier ones
    #[argh(option, short = 'm', long = "metrics")]
    pub metrics: Vec<PathBuf>,

    /// file caching the metrics of synthesized functional units
    #[argh(option, long = "custom-metrics")]
    pub custom_metrics: Option<PathBuf>,

    /// command estimating the cost of unknown functional units
    #[argh(option, long = "estimator")]
    pub estimator: Option<String>,

    /// write area and leakage statistics here
    #[argh(option, long = "stats")]
    pub stats: Option<OutputFile>,

    /// use the pipelined structural templates
    #[argh(switch, long = "pipeline")]
    pub pipeline: bool,

    /// print the parsed processes to stderr before lowering
    #[argh(switch, long = "dump-ir")]
    pub dump_ir: bool,

    /// logging level
    #[argh(option, long = "log-level", default = "log::LevelFilter::Warn")]
    pub log_level: log::LevelFilter,
}

impl Opts {
    /// The input file, if one was named.
    pub fn input(&self) -> Option<&PathBuf> {
        self.file.as_ref().filter(|p| p.as_os_str() != "-")
    }
}
