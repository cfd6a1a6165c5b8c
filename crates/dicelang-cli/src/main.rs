// ABOUTME: Command-line interface for the dicelang dice roller.
// ABOUTME: Provides roll and simulation commands with optional JSON output.

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "dicelang")]
#[command(about = "A dice notation parser and roller for TTRPGs")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Roll dice using the given expression
    Roll {
        /// Dice expression (e.g., "4d6kh3", "2d6 + 5")
        expression: String,
    },
    /// Simulate rolling dice many times
    Sim {
        /// Dice expression (e.g., "2d6")
        expression: String,

        /// Number of trials to run
        #[arg(short, long, default_value = "10000")]
        n: usize,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show dice notation reference
    Notation,
}

fn main() {
    let cli = Cli::parse();

    match cli.command {
        Commands::Roll { expression } => match dicelang::roll(&expression) {
            Ok(result) => print_roll(&expression, &result),
            Err(e) => {
                eprintln!("Error: {}", e);
                std::process::exit(1);
            }
        },
        Commands::Sim { expression, n, json } => match dicelang::simulate(&expression, n) {
            Ok(result) => {
                if json {
                    print_sim_json(&result);
                } else {
                    print_sim_histogram(&expression, &result);
                }
            }
            Err(e) => {
                eprintln!("Error: {}", e);
                std::process::exit(1);
            }
        },
        Commands::Notation => {
            print_notation_reference();
        }
    }
}

fn print_roll(expression: &str, result: &dicelang::Rolled) {
    match result.kept() {
        Ok(kept) => {
            let faces: Vec<String> = kept.iter().map(|f| f.to_string()).collect();
            println!("{} [{}] = {}", expression, faces.join(", "), result.total());
        }
        Err(_) => {
            println!("{} = {}", expression, result.total());
        }
    }
}

fn print_sim_json(result: &dicelang::SimResult) {
    use serde_json::json;

    let output = json!({
        "n": result.n,
        "min": result.min,
        "max": result.max,
        "mean": result.mean,
        "std_dev": result.std_dev,
        "distribution": result.distribution,
    });

    println!("{}", serde_json::to_string_pretty(&output).unwrap());
}

fn print_sim_histogram(expression: &str, result: &dicelang::SimResult) {
    println!("{} (n={})", expression, result.n);
    println!();

    let outcomes = result.sorted_outcomes();
    let max_count = outcomes.iter().map(|(_, c)| *c).max().unwrap_or(1);
    let max_bar_width = 40;

    for (value, count) in outcomes {
        let pct = (count as f64 / result.n as f64) * 100.0;
        let bar_width = (count as f64 / max_count as f64 * max_bar_width as f64) as usize;
        let bar: String = "█".repeat(bar_width);

        println!("{:>4}: {:40} {:5.1}%", value, bar, pct);
    }

    println!();
    println!("mean: {:.2}, std: {:.2}", result.mean, result.std_dev);
}

fn print_notation_reference() {
    println!(
        r#"DICE NOTATION REFERENCE

BASIC ROLLS
  NdS       Roll N dice with S sides (2d6, 1d20)
  dS        Roll 1 die (d20 = 1d20)
  dF        Fate/Fudge die (-1, 0, +1)
  [expr]d S Computed dice count, e.g. [1+2]d6

ARITHMETIC
  + - * /   Basic operations (2d6 + 5, (1d6 + 2) * 3)
  (...)     Grouping
  {{e1,e2}}   Grouped roll, one value per sub-expression

KEEP AND DROP
  khN       Keep highest N dice (4d6kh3)
  klN       Keep lowest N dice (2d20kl1 for disadvantage)
  dhN       Drop highest N dice
  dlN       Drop lowest N dice (4d6dl1)

EXPLODING DICE
  !         Explode on match, new die per explosion (Roll20 style)
  !!        Compounding explode, add to same die (Shadowrun style)
  !p        Penetrating explode, -1 per explosion (HackMaster style)

  With conditions (default: equal to the die's own max face):
  !>N       Explode on greater than N
  !<N       Explode on less than N
  !=N       Explode on equal to N

  Examples:
  1d6!      Standard exploding d6
  1d6!!     Compounding, adds into the same die (6 followed by 6 shows as [12])
  1d6!p     Penetrating, downgrades to a smaller die after the first chain

REROLL
  r=N       Reroll while equal to N, until it no longer matches
  ro<N      Reroll once only, if below N
  r>N       Reroll while above N

  Examples:
  1d6r=1    Reroll 1s until no longer a 1
  1d20ro<2  Reroll a natural 1 once

SUCCESS COUNTING
  >N        Count dice greater than N
  <N        Count dice less than N
  =N        Count dice equal to N
  f<N       Count dice below N as failures, subtracted from successes

  Examples:
  6d10>7f<3 World of Darkness style: count >7 as hits, <3 as botches
  8d6=6     Count only 6s

MODIFIER ORDER
  Modifiers apply in a fixed order regardless of how they're written:
  reroll -> explode -> keep/drop -> success count
  Example: 4d6r=1!kh3 rerolls 1s, explodes on 6, then keeps highest 3"#
    );
}
