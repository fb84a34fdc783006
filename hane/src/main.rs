mod input;
mod score;

use clap::Parser;
use hane_core::{init, io, AttributeKind, FitOptions, NetworkData, Trainer};
use log::info;

#[derive(Parser, Debug)]
#[command(
    version,
    about = "HANE",
    long_about = "Hyperbolic embedding of an Attributed NEtwork.\n\
		  Places nodes and latent communities in the hyperbolic plane and\n\
		  fits node angles, community centres, and an attribute decoder by\n\
		  analytic-gradient coordinate descent on the joint likelihood."
)]
struct Cli {
    /// Edge list file: one "u v" (or "u,v") pair per line
    graph_file: Box<str>,

    /// Attribute table: one numeric row per node id
    attribute_file: Box<str>,

    /// Number of latent communities
    num_communities: usize,

    /// Power-law exponent for degree-rank radii
    #[arg(long, default_value_t = 2.5)]
    gamma: f64,

    /// Attribute type: binary | real
    #[arg(long, default_value = "binary")]
    attribute_type: AttributeKind,

    /// Number of training epochs
    #[arg(short = 'e', long, default_value_t = 1000)]
    num_epochs: usize,

    /// Learning rate
    #[arg(long, default_value_t = 1e-2)]
    eta: f64,

    /// L1 penalty on community memberships
    #[arg(long, default_value_t = 1e-2)]
    lambda_f: f64,

    /// L1 penalty on decoder weights
    #[arg(long, default_value_t = 1e-2)]
    lambda_w: f64,

    /// Mixing weight between network (0) and attribute (1) likelihoods
    #[arg(long, default_value_t = 0.5)]
    alpha: f64,

    /// Ground-truth community labels, for per-epoch NMI reporting
    #[arg(short = 'c', long)]
    true_communities: Option<Box<str>>,

    /// Worker threads for gradient fan-out (0 = sequential)
    #[arg(short = 'p', long, default_value_t = 0)]
    num_threads: usize,

    /// Random seed for parameter initialization
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Output path for trained node angles
    #[arg(long, default_value = "thetas.csv")]
    thetas_out: Box<str>,

    /// Output path for the trained community table (3 x C)
    #[arg(long, default_value = "M.csv")]
    communities_out: Box<str>,

    /// Output path for trained decoder weights
    #[arg(long, default_value = "W.csv")]
    weights_out: Box<str>,

    /// verbosity
    #[arg(long, short)]
    verbose: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Cli::parse();

    if args.verbose {
        std::env::set_var("RUST_LOG", "info");
    }
    env_logger::init();

    info!(
        "reading graph from {} with gamma={}",
        args.graph_file, args.gamma
    );
    let input::LoadedGraph {
        radii_n,
        adj_nn,
        kept,
    } = input::load_graph(&args.graph_file, args.gamma)?;
    info!("largest component: {} nodes", kept.len());

    info!("reading attributes from {}", args.attribute_file);
    let attr_nk = input::load_attributes(&args.attribute_file, &kept)?;
    info!("{} attributes per node", attr_nk.ncols());

    let data = NetworkData::new(radii_n, adj_nn, attr_nk, args.attribute_type)?;

    let ordering = input::spectral_ordering(&data.adj_nn)?;

    let opts = FitOptions {
        num_communities: args.num_communities,
        num_epochs: args.num_epochs,
        learning_rate: args.eta,
        alpha: args.alpha,
        lambda_memb: args.lambda_f,
        lambda_weight: args.lambda_w,
        attribute_kind: args.attribute_type,
        num_threads: args.num_threads.min(num_cpus::get()),
        seed: args.seed,
        ..Default::default()
    };

    let params = init::initialize(&data, &opts, &ordering)?;

    let mut trainer = Trainer::new(&data, params, opts)?;
    if let Some(path) = &args.true_communities {
        info!("reading ground-truth communities from {}", path);
        let labels = input::load_labels(path, &kept)?;
        trainer = trainer.with_ground_truth(labels, Box::new(score::Nmi))?;
    }

    trainer.fit()?;

    let params = trainer.into_params();
    io::write_vector(&params.theta_n, &args.thetas_out)?;
    io::write_communities(&params.communities, &args.communities_out)?;
    io::write_matrix(&params.weight_kc, &args.weights_out)?;
    info!(
        "wrote {}, {}, {}",
        args.thetas_out, args.communities_out, args.weights_out
    );

    info!("Done");
    Ok(())
}
