// ============================================================================
// RNN LANGUAGE MODEL - command line driver
// train: text directory -> vocabulary + checkpoint, then a few samples
// sample: checkpoint + vocabulary -> sentences
// gradcheck: finite-difference check on a small random model
// ============================================================================

use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::info;
use tracing_subscriber::EnvFilter;

use rnn_lm::gradcheck::{DEFAULT_ERROR_THRESHOLD, DEFAULT_H};
use rnn_lm::{
    generate_sentences, gradient_check, train_with_sgd, Corpus, GradCheckReport, ModelConfig, Rnn,
    SampleConfig, TrainConfig, Vocabulary,
};

#[derive(Parser)]
#[command(name = "rnn-lm", version, about = "Train and sample a vanilla RNN language model")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Build a vocabulary from a directory of text files and train on it
    Train(TrainArgs),
    /// Sample sentences from a saved checkpoint
    Sample(SampleArgs),
    /// Verify backpropagation against finite differences on a random model
    Gradcheck(GradcheckArgs),
}

#[derive(Args)]
struct TrainArgs {
    /// Directory of raw text files, one sentence per line
    #[arg(long)]
    data: PathBuf,
    #[arg(long, default_value_t = 2575)]
    vocab_size: usize,
    #[arg(long, default_value_t = 100)]
    hidden_dim: usize,
    #[arg(long, default_value_t = 4)]
    bptt_truncate: usize,
    #[arg(long, default_value_t = 0.005)]
    learning_rate: f64,
    #[arg(long, default_value_t = 1)]
    epochs: usize,
    /// Evaluate the loss (and checkpoint) every N epochs
    #[arg(long, default_value_t = 5)]
    evaluate_every: usize,
    /// Checkpoint written at every evaluation; the vocabulary goes next to it
    #[arg(long)]
    checkpoint: Option<PathBuf>,
    /// Resume from an existing checkpoint
    #[arg(long)]
    load: Option<PathBuf>,
    /// Sentences to sample once training finishes
    #[arg(long, default_value_t = 5)]
    samples: usize,
    #[arg(long)]
    seed: Option<u64>,
}

#[derive(Args)]
struct SampleArgs {
    #[arg(long)]
    checkpoint: PathBuf,
    /// Defaults to the vocabulary saved next to the checkpoint
    #[arg(long)]
    vocab: Option<PathBuf>,
    #[arg(long, default_value_t = 10)]
    count: usize,
    #[arg(long, default_value_t = 100)]
    max_attempts: usize,
    #[arg(long, default_value_t = 200)]
    max_len: usize,
    #[arg(long)]
    seed: Option<u64>,
}

#[derive(Args)]
struct GradcheckArgs {
    #[arg(long, default_value_t = 10)]
    hidden_dim: usize,
    #[arg(long, default_value_t = 100)]
    vocab_size: usize,
    #[arg(long, default_value_t = 5)]
    seq_len: usize,
    #[arg(long, default_value_t = DEFAULT_H)]
    h: f64,
    #[arg(long, default_value_t = DEFAULT_ERROR_THRESHOLD)]
    threshold: f64,
    #[arg(long)]
    seed: Option<u64>,
}

fn make_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(s) => StdRng::seed_from_u64(s),
        None => StdRng::from_entropy(),
    }
}

fn vocab_path(checkpoint: &Path) -> PathBuf {
    checkpoint.with_extension("vocab.json")
}

fn print_sentences(sentences: &[Vec<String>]) {
    println!("{}", "-".repeat(70));
    for s in sentences {
        println!("{}", s.join(" "));
    }
    println!("{}", "-".repeat(70));
}

fn train(args: TrainArgs) -> anyhow::Result<()> {
    let mut rng = make_rng(args.seed);
    let corpus = Corpus::from_dir(&args.data, args.vocab_size)
        .with_context(|| format!("loading corpus from {}", args.data.display()))?;

    let mut rnn = match &args.load {
        Some(fp) => {
            let rnn = Rnn::from_checkpoint(fp, args.bptt_truncate)
                .with_context(|| format!("loading checkpoint {}", fp.display()))?;
            if rnn.word_dim() != corpus.vocab.len() {
                bail!(
                    "checkpoint {} was trained on {} tokens but the corpus vocabulary has {}",
                    fp.display(), rnn.word_dim(), corpus.vocab.len()
                );
            }
            rnn
        }
        None => {
            let cfg = ModelConfig {
                vocab_size: corpus.vocab.len(),
                hidden_dim: args.hidden_dim,
                bptt_truncate: args.bptt_truncate,
                checkpoint: None,
            };
            Rnn::new(&cfg, &mut rng)?
        }
    };
    rnn.checkpoint = args.checkpoint.clone();
    if let Some(fp) = &args.checkpoint {
        corpus.vocab.save(&vocab_path(fp))?;
    }

    let cfg = TrainConfig {
        learning_rate: args.learning_rate,
        nepoch: args.epochs,
        evaluate_loss_after: args.evaluate_every,
    };
    let report = train_with_sgd(&mut rnn, &corpus.examples, &cfg)?;
    if let Some(&(_, loss)) = report.losses.last() {
        info!("Last evaluated loss: {:.6}", loss);
    }
    if let Some(fp) = &args.checkpoint {
        rnn.save(fp)?;
    }

    if args.samples > 0 {
        let sentences = generate_sentences(&rnn, &corpus.vocab, &mut rng, &SampleConfig::default(), args.samples)?;
        print_sentences(&sentences);
    }
    Ok(())
}

fn sample(args: SampleArgs) -> anyhow::Result<()> {
    let mut rng = make_rng(args.seed);
    let vocab_fp = args.vocab.clone().unwrap_or_else(|| vocab_path(&args.checkpoint));
    let vocab = Vocabulary::load(&vocab_fp).with_context(|| format!("loading vocabulary {}", vocab_fp.display()))?;
    let rnn = Rnn::from_checkpoint(&args.checkpoint, ModelConfig::default().bptt_truncate)
        .with_context(|| format!("loading checkpoint {}", args.checkpoint.display()))?;
    let cfg = SampleConfig { max_attempts: args.max_attempts, max_len: args.max_len };
    let sentences = generate_sentences(&rnn, &vocab, &mut rng, &cfg, args.count)?;
    print_sentences(&sentences);
    Ok(())
}

fn gradcheck(args: GradcheckArgs) -> anyhow::Result<()> {
    let mut rng = make_rng(args.seed);
    let cfg = ModelConfig {
        vocab_size: args.vocab_size,
        hidden_dim: args.hidden_dim,
        ..ModelConfig::default()
    };
    let mut rnn = Rnn::new(&cfg, &mut rng)?;
    let seq: Vec<usize> = (0..=args.seq_len).map(|_| rng.gen_range(0..args.vocab_size)).collect();
    let (xs, ys) = (&seq[..args.seq_len], &seq[1..]);
    match gradient_check(&mut rnn, xs, ys, args.h, args.threshold)? {
        GradCheckReport::Passed => {
            info!("All gradients agree within relative error {}", args.threshold);
            Ok(())
        }
        GradCheckReport::Failed(f) => bail!(
            "gradient check failed for {} at {:?}: relative error {:.6}",
            f.parameter, f.index, f.relative_error
        ),
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    match Cli::parse().command {
        Command::Train(args) => train(args),
        Command::Sample(args) => sample(args),
        Command::Gradcheck(args) => gradcheck(args),
    }
}
