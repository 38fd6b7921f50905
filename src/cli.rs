use std::fs;
use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use comfy_table::{Cell, ContentArrangement, Table};
use log::debug;

use plo_gto::api::split_board;
use plo_gto::cards::{parse_board, parse_hand, Hand};
use plo_gto::equity::{
    calculate_double_board_stats, simulate_equity, simulate_estimated_equity, ShortDeckPolicy,
    SimulationConfig, TieCredit,
};
use plo_gto::error::{GtoError, GtoResult};
use plo_gto::game_state::GameState;
use plo_gto::math_engine::{fold_probability, mdf, pot_odds};
use plo_gto::solver::{solve_spot_with, SolverConfig};
use plo_gto::texture::analyze_board;

use crate::display::{
    board_display, category_table, double_board_table, equity_bar, equity_table, print_error,
    print_section, report_table, strategy_table,
};

#[derive(Parser)]
#[command(name = "plo", version = "1.0.0", about = "PLO equity simulator and CFR spot solver.")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum TieMode {
    /// Ties credited 1/hands-in-pot
    Pot,
    /// Ties credited 1/co-winners
    Winners,
}

impl From<TieMode> for TieCredit {
    fn from(mode: TieMode) -> TieCredit {
        match mode {
            TieMode::Pot => TieCredit::PotShare,
            TieMode::Winners => TieCredit::CoWinners,
        }
    }
}

#[derive(clap::Args)]
struct SimArgs {
    /// Number of iterations
    #[arg(short = 'n', long, default_value = "20000")]
    iterations: u32,
    /// RNG seed for a reproducible run
    #[arg(long)]
    seed: Option<u64>,
    /// Worker threads (defaults depend on the simulation)
    #[arg(short, long)]
    workers: Option<usize>,
    /// How ties count towards equity
    #[arg(long, default_value = "pot")]
    ties: TieMode,
}

impl SimArgs {
    fn config(&self) -> SimulationConfig {
        SimulationConfig {
            workers: self.workers,
            seed: self.seed,
            tie_credit: self.ties.into(),
            ..SimulationConfig::default()
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Equity of two or more known hands
    Equity {
        /// Hands, e.g. AhAdKsKd QhQdJcJs
        #[arg(required = true, num_args = 2..)]
        hands: Vec<String>,
        /// Board cards (e.g. Ts9s2d); with --double, top board then bottom
        #[arg(short, long, default_value = "")]
        board: String,
        /// Play two boards
        #[arg(long)]
        double: bool,
        #[command(flatten)]
        sim: SimArgs,
    },
    /// Equity of one hand against random opponents
    Estimate {
        hand: String,
        #[arg(short, long, default_value = "")]
        board: String,
        /// Number of random opponents
        #[arg(short, long, default_value = "1")]
        opponents: usize,
        /// Dead cards to exclude from the deck
        #[arg(long, default_value = "")]
        folded: String,
        /// Cap on sampled deals (0 for none)
        #[arg(long, default_value = "0")]
        max_combos: u32,
        /// Count every deal as a loss when no opponent can be dealt
        #[arg(long)]
        short_deck_loss: bool,
        #[command(flatten)]
        sim: SimArgs,
    },
    /// Scoop, chop and split frequencies on two boards
    Double {
        #[arg(required = true, num_args = 2..)]
        hands: Vec<String>,
        #[arg(long, default_value = "")]
        top: String,
        #[arg(long, default_value = "")]
        bottom: String,
        #[command(flatten)]
        sim: SimArgs,
    },
    /// Analyze board texture
    Board {
        cards: String,
    },
    /// Pot odds and minimum defense for a bet
    Odds {
        pot: f64,
        bet: f64,
        /// Players facing the bet
        #[arg(short, long, default_value = "1")]
        players: usize,
    },
    /// Solve a spot described by a JSON game state
    Solve {
        /// Path to the game state JSON
        state: PathBuf,
        /// Solver config JSON
        #[arg(short, long)]
        config: Option<PathBuf>,
        #[arg(short = 'n', long)]
        iterations: Option<u32>,
        #[arg(long)]
        seed: Option<u64>,
        /// Rows of the strategy table
        #[arg(long, default_value = "15")]
        top: usize,
        /// Print the full solution as JSON
        #[arg(long)]
        json: bool,
    },
}

pub fn run() {
    let cli = Cli::parse();
    if let Err(e) = dispatch(cli) {
        print_error(&e.to_string());
        std::process::exit(1);
    }
}

fn dispatch(cli: Cli) -> GtoResult<()> {
    match cli.command {
        Commands::Equity {
            hands,
            board,
            double,
            sim,
        } => cmd_equity(&hands, &board, double, &sim),
        Commands::Estimate {
            hand,
            board,
            opponents,
            folded,
            max_combos,
            short_deck_loss,
            sim,
        } => cmd_estimate(&hand, &board, opponents, &folded, max_combos, short_deck_loss, &sim),
        Commands::Double {
            hands,
            top,
            bottom,
            sim,
        } => cmd_double(&hands, &top, &bottom, &sim),
        Commands::Board { cards } => cmd_board(&cards),
        Commands::Odds { pot, bet, players } => cmd_odds(pot, bet, players),
        Commands::Solve {
            state,
            config,
            iterations,
            seed,
            top,
            json,
        } => cmd_solve(&state, config.as_deref(), iterations, seed, top, json),
    }
}

fn parse_hands(hands: &[String]) -> GtoResult<Vec<Hand>> {
    hands.iter().map(|h| parse_hand(h)).collect()
}

fn read_file(path: &std::path::Path) -> GtoResult<String> {
    fs::read_to_string(path)
        .map_err(|e| GtoError::InvalidValue(format!("{}: {}", path.display(), e)))
}

fn cmd_equity(hands: &[String], board: &str, double: bool, sim: &SimArgs) -> GtoResult<()> {
    let parsed = parse_hands(hands)?;
    let board = split_board(parse_board(board)?, double);
    debug!("equity: {} hands on {:?}", parsed.len(), board);

    println!();
    for (i, b) in board.boards().iter().enumerate() {
        let label = if board.is_double() { format!("Board {}", i + 1) } else { "Board".to_string() };
        println!("  {}: {}", label.bold(), board_display(b));
    }
    println!("  Running {} iterations...\n", sim.iterations.to_string().bold());

    let result = simulate_equity(&parsed, &board, sim.iterations, &sim.config())?;
    println!("{}", equity_table(hands, &result.equity_pct(), &result.tie_pct()));
    for (label, breakdown) in hands.iter().zip(&result.categories) {
        println!("\n{}", category_table(label, breakdown));
    }
    Ok(())
}

fn cmd_estimate(
    hand: &str,
    board: &str,
    opponents: usize,
    folded: &str,
    max_combos: u32,
    short_deck_loss: bool,
    sim: &SimArgs,
) -> GtoResult<()> {
    let hero = parse_hand(hand)?;
    let board = parse_board(board)?;
    let folded = parse_board(folded)?;
    let mut config = sim.config();
    if short_deck_loss {
        config.short_deck = ShortDeckPolicy::CountAsLoss;
    }

    let result = simulate_estimated_equity(
        &hero,
        &board,
        sim.iterations,
        &folded,
        max_combos,
        opponents,
        &config,
    )?;

    println!();
    println!(
        "  {} vs {} random on {}",
        hand.bold(),
        result.opponents,
        board_display(&board)
    );
    println!("  Equity: {}", equity_bar(result.equity_pct() / 100.0, 30));
    println!("  Ties:   {:.2}%\n", result.tie_pct());
    println!("{}", category_table("Hero", &result.hand_breakdown));
    println!("\n{}", category_table("Opponents", &result.opponent_breakdown));
    Ok(())
}

fn cmd_double(hands: &[String], top: &str, bottom: &str, sim: &SimArgs) -> GtoResult<()> {
    let parsed = parse_hands(hands)?;
    let top = parse_board(top)?;
    let bottom = parse_board(bottom)?;

    println!();
    println!("  {}: {}", "Top".bold(), board_display(&top));
    println!("  {}: {}\n", "Bottom".bold(), board_display(&bottom));

    let stats = calculate_double_board_stats(&parsed, &top, &bottom, sim.iterations, &sim.config())?;
    println!("{}", double_board_table(hands, &stats));
    Ok(())
}

fn cmd_board(cards: &str) -> GtoResult<()> {
    let board = parse_board(cards)?;
    let texture = analyze_board(&board)?;

    println!();
    println!("  {}  [{}]", board_display(&board), texture.code().dimmed());

    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    let yes_no = |b: bool| if b { "yes".green().to_string() } else { "no".dimmed().to_string() };
    let rows = [
        ("Suits", format!("{:?}", texture.suitedness)),
        ("Paired", yes_no(texture.is_paired)),
        ("Connectedness", texture.connectedness.to_string()),
        ("Flush possible", yes_no(texture.flush_possible)),
        ("Straight possible", yes_no(texture.straight_possible)),
        ("Flush draw", yes_no(texture.flush_draw_possible)),
        ("Straight draw", yes_no(texture.straight_draw_possible)),
        ("Draw heaviness", format!("{:.2}", texture.draw_heaviness)),
        ("Nutability", texture.nutability.to_string()),
    ];
    for (name, value) in rows {
        table.add_row(vec![Cell::new(name.bold().to_string()), Cell::new(value)]);
    }
    println!("{}", table);
    Ok(())
}

fn cmd_odds(pot: f64, bet: f64, players: usize) -> GtoResult<()> {
    let facing = pot + bet;
    let odds = pot_odds(facing, bet)?;
    let defend = mdf(bet, pot)?;
    let fold = fold_probability(bet, pot, players);

    print_section("Pot odds", &format!("{:.1}% equity to call", odds * 100.0));
    print_section("MDF", &format!("{:.1}% per player", defend * 100.0));
    print_section(
        "All fold",
        &format!("{:.1}% with {} player(s) at MDF", fold * 100.0, players),
    );
    Ok(())
}

fn cmd_solve(
    state_path: &std::path::Path,
    config_path: Option<&std::path::Path>,
    iterations: Option<u32>,
    seed: Option<u64>,
    top: usize,
    json: bool,
) -> GtoResult<()> {
    let state = GameState::from_json(&read_file(state_path)?)?;
    let mut config = match config_path {
        Some(p) => SolverConfig::from_json(&read_file(p)?)?,
        None => SolverConfig::default(),
    };
    if seed.is_some() {
        config.seed = seed;
    }

    let solution = solve_spot_with(&state, iterations, &config)?;
    if json {
        println!("{}", solution.to_json()?);
        return Ok(());
    }

    println!();
    for b in state.board.boards() {
        println!("  {}: {}", "Board".bold(), board_display(b));
    }
    println!(
        "  Pot {:.1}, {} iterations, entropy {:.3}\n",
        state.pot_size, solution.iterations, solution.approx_exploitability
    );
    for (player, eq) in solution.equity.iter().enumerate() {
        println!(
            "  P{}  {}  EV {:+.2}",
            player,
            equity_bar(eq / 100.0, 24),
            solution.ev[player]
        );
    }
    println!("\n{}", strategy_table(&solution.strategies, top));
    if let Some(texture) = &solution.report.texture {
        print_section("Texture", &format!("{} ({})", texture.code(), texture.nutability));
    }
    println!("\n{}", report_table(&solution.report));
    Ok(())
}
