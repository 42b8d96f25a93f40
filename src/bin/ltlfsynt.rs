//! Reactive synthesis from LTLf specifications: decide realizability
//! and extract a Mealy-machine strategy.

use clap::Parser;
use rsltlf::builder::{ltlf_to_mtdfa_compose, ltlf_to_mtdfa_for_synthesis, new_dict};
use rsltlf::game::{
    mtdfa_strategy_to_mealy, mtdfa_to_backprop, mtdfa_winning_region_lazy,
    mtdfa_winning_region_lazy3, mtdfa_winning_strategy,
};
use rsltlf::ltlf::LtlfSimplifier;
use rsltlf::minimize_mtdfa;
use rsltlf::options::{BackpropMode, PreprocessChoice, Semantics, SynthesisBackprop, Translation};
use rsltlf::repr::parse_ltlf;
use std::io::Write;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "ltlfsynt", about = "LTLf reactive synthesis over MTBDD-based DFAs")]
struct Args {
    /// LTLf specification
    formula: String,

    /// comma-separated controllable atomic propositions
    #[arg(long, value_delimiter = ',')]
    outs: Vec<String>,

    /// construction: direct-restricted, bfs-on-the-fly,
    /// dfs-on-the-fly, dfs-strict-on-the-fly, or compositional
    #[arg(long, default_value = "bfs-on-the-fly")]
    translation: Translation,

    /// back-propagation granularity for the offline solvers
    /// (nodes, states, trival-states)
    #[arg(long, default_value = "nodes")]
    backprop: BackpropMode,

    /// Mealy or Moore variable ordering
    #[arg(long, default_value = "mealy")]
    semantics: Semantics,

    /// only decide realizability, do not build a strategy
    #[arg(long)]
    realizability: bool,

    /// one-step realizability preprocessing (yes, no)
    #[arg(long, default_value = "yes")]
    one_step: PreprocessChoice,

    /// skip the cheap LTLf formula simplification
    #[arg(long)]
    no_simplify_formula: bool,

    /// print the strategy as a Mealy machine in DOT format
    #[arg(long)]
    dot: bool,
}

fn run(args: &Args) -> rsltlf::Result<bool> {
    let mut f = parse_ltlf(&args.formula)?;
    if !args.no_simplify_formula {
        f = LtlfSimplifier::new().simplify(&f);
    }
    let dict = new_dict();
    let one_step = args.one_step.enabled();

    let strategy = match args.translation {
        Translation::BfsOnTheFly
        | Translation::DfsOnTheFly
        | Translation::DfsStrictOnTheFly => {
            let mode = match args.translation {
                Translation::BfsOnTheFly => SynthesisBackprop::BfsNodes,
                Translation::DfsOnTheFly => SynthesisBackprop::DfsNodes,
                _ => SynthesisBackprop::DfsStrictNodes,
            };
            ltlf_to_mtdfa_for_synthesis(
                &f,
                &dict,
                &args.outs,
                mode,
                one_step,
                args.realizability,
                true,
                true,
                args.semantics,
            )?
        }
        _ => {
            // offline: translate fully, then solve
            let game = match args.translation {
                Translation::Compositional => {
                    let mut dfa =
                        ltlf_to_mtdfa_compose(&f, &dict, true, false, false, true, true)?;
                    dfa.set_controllable_variables_by_names(&args.outs, true)?;
                    dfa
                }
                _ => ltlf_to_mtdfa_for_synthesis(
                    &f,
                    &dict,
                    &args.outs,
                    SynthesisBackprop::StateRefine,
                    one_step,
                    args.realizability,
                    true,
                    true,
                    args.semantics,
                )?,
            };
            if args.realizability {
                return Ok(match args.backprop {
                    BackpropMode::Nodes => {
                        let arena = mtdfa_to_backprop(&game, true, false)?;
                        arena.is_determined(0) && arena.winner(0)
                    }
                    BackpropMode::States => mtdfa_winning_region_lazy(&game)[0],
                    BackpropMode::TrivalStates => {
                        mtdfa_winning_region_lazy3(&game)[0].is_true()
                    }
                });
            }
            mtdfa_winning_strategy(&game, args.backprop == BackpropMode::Nodes)?
        }
    };

    // an unrealizable specification came back as the single-state ⊥
    let realizable = !strategy.is_empty();
    if args.realizability {
        return Ok(realizable);
    }
    if realizable && args.dot {
        let mealy = mtdfa_strategy_to_mealy(&minimize_mtdfa(&strategy), true);
        let stdout = std::io::stdout();
        let mut out = stdout.lock();
        let mgr = strategy.dict().borrow();
        mealy.print_dot(&mgr, &mut out).expect("write stdout");
    }
    Ok(realizable)
}

fn main() -> ExitCode {
    env_logger::init();
    let args = Args::parse();
    match run(&args) {
        Ok(true) => {
            println!("REALIZABLE");
            ExitCode::SUCCESS
        }
        Ok(false) => {
            println!("UNREALIZABLE");
            ExitCode::from(1)
        }
        Err(e) => {
            eprintln!("ltlfsynt: {}", e);
            ExitCode::from(2)
        }
    }
}
