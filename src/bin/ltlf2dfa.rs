//! Translate an LTLf formula into an MTDFA and print it.

use clap::Parser;
use rsltlf::builder::{ltlf_to_mtdfa, ltlf_to_mtdfa_compose, new_dict};
use rsltlf::minimize_mtdfa;
use rsltlf::options::{Composition, Translation};
use rsltlf::repr::parse_ltlf;
use std::io::Write;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "ltlf2dfa", about = "translate LTLf formulas to MTBDD-based DFAs")]
struct Args {
    /// LTLf formula
    formula: String,

    /// translation pipeline (direct, compositional)
    #[arg(long, default_value = "direct")]
    translation: Translation,

    /// ordering heuristic of the compositional translation (size, ap)
    #[arg(long, default_value = "size")]
    composition: Composition,

    /// minimize the result (intermediates too, when compositional)
    #[arg(long)]
    minimize: bool,

    /// do not coalesce states with identical MTBDDs
    #[arg(long)]
    no_fuse: bool,

    /// do not apply cheap formula rewritings before interning
    #[arg(long)]
    no_simplify: bool,

    /// collapse empty/universal automata to a single state
    #[arg(long)]
    detect_empty_univ: bool,

    /// label states with their formulas in the DOT output
    #[arg(long)]
    labels: bool,

    /// print statistics as JSON instead of DOT
    #[arg(long)]
    stats: bool,
}

fn run(args: &Args) -> rsltlf::Result<()> {
    let f = parse_ltlf(&args.formula)?;
    let dict = new_dict();
    let fuse = !args.no_fuse;
    let simplify = !args.no_simplify;
    let dfa = match args.translation {
        Translation::Compositional => ltlf_to_mtdfa_compose(
            &f,
            &dict,
            args.minimize,
            args.composition == Composition::Ap,
            args.labels,
            fuse,
            simplify,
        )?,
        _ => {
            let dfa = ltlf_to_mtdfa(&f, &dict, fuse, simplify, args.detect_empty_univ)?;
            if args.minimize {
                minimize_mtdfa(&dfa)
            } else {
                dfa
            }
        }
    };
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    if args.stats {
        let stats = dfa.get_stats(true, true);
        writeln!(out, "{}", serde_json::to_string_pretty(&stats).expect("stats serialize"))
            .expect("write stdout");
    } else {
        dfa.print_dot(&mut out, None, args.labels).expect("write stdout");
    }
    Ok(())
}

fn main() -> ExitCode {
    env_logger::init();
    let args = Args::parse();
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("ltlf2dfa: {}", e);
            ExitCode::from(2)
        }
    }
}
