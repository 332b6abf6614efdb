use std::io::{self, BufRead};

use anyhow::{Context, Result, bail};
use clap::Parser;
use minefield_core::{BOMB, Board, BoardState, Position, RandomPlacement, RevealOutcome};
use tracing_subscriber::filter::LevelFilter;

#[derive(Parser, Debug)]
#[command(name = "minefield", about = "Terminal front end for the minefield rule engine")]
struct Args {
    /// Board width in cells.
    #[arg(long, default_value_t = 10)]
    width: u16,

    /// Board height in cells.
    #[arg(long, default_value_t = 10)]
    height: u16,

    /// Number of bombs to plant.
    #[arg(long, default_value_t = 10)]
    bombs: u32,

    /// RNG seed for bomb placement; a random seed is used when omitted.
    #[arg(long)]
    seed: Option<u64>,

    /// Increase log verbosity (-v debug, -vv trace).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

struct Game {
    board: Board,
    bombs: u32,
    seed: u64,
}

impl Game {
    /// Bombs are planted lazily on the first reveal, with that position
    /// excluded, so the first click can never lose.
    fn ensure_planted(&mut self, first_reveal: Position) -> Result<()> {
        if self.board.state() != BoardState::Ready {
            return Ok(());
        }

        let placement = RandomPlacement::from_seed_excluding(self.seed, first_reveal);
        self.board
            .plant_bombs(self.bombs, placement)
            .context("planting bombs")?;
        Ok(())
    }

    fn run(&mut self) -> Result<()> {
        println!("{}", self.masked_view()?);
        print_help();

        for line in io::stdin().lock().lines() {
            let line = line.context("reading input")?;
            match self.dispatch(line.trim()) {
                Ok(true) => {}
                Ok(false) => break,
                Err(err) => println!("error: {err}"),
            }
        }
        Ok(())
    }

    /// Returns `false` when the player quits.
    fn dispatch(&mut self, line: &str) -> Result<bool> {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        match tokens.as_slice() {
            [] => {}
            ["q"] | ["quit"] => return Ok(false),
            ["h"] | ["help"] => print_help(),
            ["p"] => println!("{}", self.masked_view()?),
            ["d"] => println!("{}", self.board),
            ["j"] => println!("{}", serde_json::to_string_pretty(&self.board)?),
            ["r", rest @ ..] => self.reveal(parse_position(rest)?, false)?,
            ["k", rest @ ..] => self.reveal(parse_position(rest)?, true)?,
            ["c", rest @ ..] => self.toggle(parse_position(rest)?)?,
            _ => bail!("unknown command, try h"),
        }
        Ok(true)
    }

    fn reveal(&mut self, pos: Position, chord: bool) -> Result<()> {
        self.ensure_planted(pos)?;

        let outcome = if chord {
            self.board.chord_reveal(pos)?
        } else {
            self.board.reveal(pos)?
        };

        match outcome {
            RevealOutcome::Bomb => {
                println!("{}", self.masked_view()?);
                println!("Boom. The field was:");
                println!("{}", self.board);
            }
            RevealOutcome::Win => {
                println!("{}", self.masked_view()?);
                println!("All safe cells revealed, you win.");
            }
            RevealOutcome::NoChange => println!("Already settled."),
            RevealOutcome::Tip | RevealOutcome::Zero => println!("{}", self.masked_view()?),
        }
        Ok(())
    }

    fn toggle(&mut self, pos: Position) -> Result<()> {
        let checked = self.board.toggle_check(pos)?;
        log::debug!("Toggled check at {:?} to {}", pos, checked);
        println!(
            "{} bombs left unchecked.",
            self.board.bombs_left()
        );
        println!("{}", self.masked_view()?);
        Ok(())
    }

    fn masked_view(&self) -> Result<String> {
        let mut out = String::new();
        for y in 0..self.board.height() {
            for x in 0..self.board.width() {
                let cell = self.board.get((x, y))?;
                let glyph = if cell.is_revealed {
                    match cell.value {
                        value if value == BOMB => '*',
                        0 => ' ',
                        value => (b'0' + value as u8) as char,
                    }
                } else if cell.is_checked {
                    'F'
                } else {
                    '#'
                };
                if x > 0 {
                    out.push(' ');
                }
                out.push(glyph);
            }
            if y + 1 < self.board.height() {
                out.push('\n');
            }
        }
        Ok(out)
    }
}

fn parse_position(args: &[&str]) -> Result<Position> {
    match args {
        [flat] => Ok(Position::Flat(flat.parse().context("flat index")?)),
        [x, y] => Ok(Position::Xy(
            x.parse().context("x coordinate")?,
            y.parse().context("y coordinate")?,
        )),
        _ => bail!("expected a flat index or an x y pair"),
    }
}

fn print_help() {
    println!("commands:");
    println!("  r <pos>   reveal a cell");
    println!("  c <pos>   toggle the suspected-bomb marker");
    println!("  k <pos>   chord: reveal around a satisfied number");
    println!("  p         print the board");
    println!("  d         dump all values (debug)");
    println!("  j         dump the engine state as JSON");
    println!("  q         quit");
    println!("<pos> is either a flat index or an `x y` pair.");
}

fn main() -> Result<()> {
    let args = Args::parse();

    let level = match args.verbose {
        0 => LevelFilter::INFO,
        1 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    };
    tracing_subscriber::fmt().with_max_level(level).init();

    let seed = args.seed.unwrap_or_else(rand::random);
    log::info!(
        "Board {}x{}, {} bombs, seed {}",
        args.width,
        args.height,
        args.bombs,
        seed
    );

    let mut game = Game {
        board: Board::new(args.width, args.height),
        bombs: args.bombs,
        seed,
    };
    game.run()
}
