#![cfg(not(tarpaulin_include))]

use synapse::content::Catalog;
use synapse::feed::{self, FeedTab, ITEMS_PER_PAGE};
use synapse::saving::read_json;
use synapse::topics::derive_topics;
use synapse::tracks::{TRACKS, resolve_bits};
use synapse::utils::{format_time, now_millis};
use synapse::{Bit, Config};

use std::io::{self, Write};
use std::time::Instant;

struct Browser {
    catalog: Catalog,
    search: String,
    tab: FeedTab,
    page: usize,
}

impl Browser {
    fn matches(&self) -> Vec<&Bit> {
        feed::filter_bits(&self.catalog.bits, &self.search, &self.tab, &[])
    }

    fn display(&self) {
        let matches = self.matches();
        let page = feed::paginate(&matches, self.page, ITEMS_PER_PAGE);
        let now = now_millis();

        println!();
        println!(
            "Page {}/{} ({} bits, tab: {:?}, search: {:?})",
            page.page,
            page.total_pages.max(1),
            page.total,
            self.tab,
            self.search
        );
        for bit in page.items {
            let marker = if bit.is_locked(false) { " [PRO]" } else { "" };
            println!(
                "  {:<45} {:>4} votes  {:<14} {}{}",
                bit.slug(),
                bit.votes,
                bit.topic(),
                format_time(bit.timestamp, now),
                marker
            );
        }
    }

    fn total_pages(&self) -> usize {
        self.matches().len().div_ceil(ITEMS_PER_PAGE).max(1)
    }
}

fn print_bit(bit: &Bit) {
    println!();
    println!("# {}", bit.title);
    println!("{}", bit.summary);
    println!(
        "[{:?}] by {}, tags: {}",
        bit.difficulty,
        bit.author,
        bit.tags.join(", ")
    );
    if bit.is_locked(false) {
        println!("(Pro bit: sign in on the website to read it.)");
        return;
    }
    println!();
    println!("{}", bit.content);
    if let Some(code) = &bit.code_snippet {
        println!();
        println!("```{}", bit.language.as_deref().unwrap_or_default());
        println!("{code}");
        println!("```");
    }
}

fn load_catalog(config: &Config) -> Result<Catalog, Box<dyn std::error::Error>> {
    let mut catalog = match &config.catalog_path {
        Some(path) => Catalog::from_path(path)?,
        None => Catalog::seed()?,
    };
    catalog.merge_saved(read_json(&config.database_dir.join("bits.json"))?);
    Ok(catalog)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let config = Config::load()?;
    let mut browser = Browser {
        catalog: load_catalog(&config)?,
        search: String::new(),
        tab: FeedTab::All,
        page: 1,
    };

    let mut start_time = Instant::now();
    let mut status = String::from("ok");
    let mut show = true;
    loop {
        if show {
            browser.display();
        }
        show = true;

        print!("[{:.1}] ({}) > ", start_time.elapsed().as_secs_f64(), status);
        io::stdout().flush()?;

        let mut command = String::new();
        if io::stdin().read_line(&mut command)? == 0 {
            break;
        }
        let command = command.trim();
        start_time = Instant::now();
        status = String::from("ok");

        let (verb, arg) = match command.split_once(' ') {
            Some((verb, arg)) => (verb, arg.trim()),
            None => (command, ""),
        };

        match verb {
            "q" => break,
            "help" => {
                println!("Commands:");
                println!("  n: Next page");
                println!("  p: Previous page");
                println!("  search <term>: Filter by title or tag (empty clears)");
                println!("  tab <name>: all, trending, saved, or any tag");
                println!("  open <slug>: Show a bit");
                println!("  topics: List topics by size");
                println!("  tracks: List learning tracks");
                println!("  q: Quit");
                show = false;
            }
            "n" if browser.page < browser.total_pages() => browser.page += 1,
            "p" if browser.page > 1 => browser.page -= 1,
            "n" | "p" => status = String::from("no more pages"),
            "search" => {
                browser.search = arg.to_string();
                browser.page = 1;
            }
            "tab" => {
                browser.tab = arg.parse().unwrap_or_default();
                browser.page = 1;
            }
            "open" => match browser.catalog.find_bit(arg) {
                Some(bit) => {
                    print_bit(bit);
                    show = false;
                }
                None => status = String::from("unknown bit"),
            },
            "topics" => {
                for topic in derive_topics(&browser.catalog.bits) {
                    println!("  {:<16} {:>3} bits", topic.label, topic.count);
                }
                show = false;
            }
            "tracks" => {
                for track in TRACKS.iter() {
                    let lock = if track.is_locked(false) { " [PRO]" } else { "" };
                    println!("  {} ({:?}){}", track.title, track.level, lock);
                    for bit in resolve_bits(track, &browser.catalog.bits) {
                        println!("    - {}", bit.slug());
                    }
                }
                show = false;
            }
            "" => show = false,
            _ => status = String::from("invalid command"),
        }
    }

    Ok(())
}
