use anyhow::{bail, Context, Result};
use clap::{Arg, ArgMatches, Command};
use crossterm::{
    queue,
    style::{Color, Print, ResetColor, SetForegroundColor},
};
use delve::config::ZoneConfig;
use delve::instance::{InstanceConfig, WaypointOutcome, ZoneEvent, ZoneManager};
use delve::zone::{map_legend, render_ascii, GridPos, MapView, TemplateRegistry, ZoneGenerator, PLAYER_GLYPH};
use std::io::{self, Write};
use std::path::PathBuf;
use tokio::sync::mpsc::{self, UnboundedReceiver};

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let matches = Command::new("delve")
        .about("Seeded procedural zones and per-player zone instances")
        .version("0.1.0")
        .arg(
            Arg::new("config")
                .long("config")
                .global(true)
                .value_name("FILE")
                .default_value("delve.json")
                .help("JSON configuration file"),
        )
        .arg(
            Arg::new("templates")
                .long("templates")
                .global(true)
                .value_name("FILE")
                .help("Extra zone templates to register"),
        )
        .subcommand(Command::new("templates").about("List registered zone templates"))
        .subcommand(
            Command::new("generate")
                .about("Generate a zone and print its map")
                .arg(Arg::new("template").required(true))
                .arg(seed_arg()),
        )
        .subcommand(
            Command::new("simulate")
                .about("Create an instance and fight through it")
                .arg(Arg::new("template").required(true))
                .arg(seed_arg())
                .arg(
                    Arg::new("player")
                        .long("player")
                        .value_name("ID")
                        .default_value("p1"),
                ),
        )
        .get_matches();

    let config = load_config(&matches)?;
    let registry = load_registry(&config)?;

    match matches.subcommand() {
        Some(("templates", _)) => list_templates(&registry),
        Some(("generate", sub)) => run_generate(&registry, &config, sub),
        Some(("simulate", sub)) => run_simulate(registry, config, sub),
        _ => {
            println!("Nothing to do. Try `delve templates` or `delve generate ashen_harbor`.");
            Ok(())
        }
    }
}

fn seed_arg() -> Arg {
    Arg::new("seed")
        .long("seed")
        .value_name("SEED")
        .value_parser(clap::value_parser!(u64))
        .help("Seed for the zone generator")
}

fn load_config(matches: &ArgMatches) -> Result<ZoneConfig> {
    let path = matches
        .get_one::<String>("config")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("delve.json"));
    let mut config = ZoneConfig::load(&path)?;

    if let Some(templates) = matches.get_one::<String>("templates") {
        config.templates_path = Some(PathBuf::from(templates));
    }
    Ok(config)
}

fn load_registry(config: &ZoneConfig) -> Result<TemplateRegistry> {
    let mut registry = TemplateRegistry::builtin().context("Built-in templates are invalid")?;

    if let Some(path) = &config.templates_path {
        let count = registry
            .load_file(path)
            .with_context(|| format!("Failed to load templates from {}", path.display()))?;
        log::info!("Registered {} templates from {}", count, path.display());
    }

    for problem in registry.validate() {
        eprintln!("warning: {}", problem);
    }
    Ok(registry)
}

fn resolve_seed(sub: &ArgMatches, config: &ZoneConfig) -> u64 {
    sub.get_one::<u64>("seed")
        .copied()
        .or(config.default_seed)
        .unwrap_or_else(|| rand::random::<u32>() as u64)
}

fn list_templates(registry: &TemplateRegistry) -> Result<()> {
    println!("{:<18} {:<22} {:>5} {:<8} {:<8} {:<7}", "ID", "NAME", "LEVEL", "LAYOUT", "SIZE", "DENSITY");
    for template in registry.all() {
        println!(
            "{:<18} {:<22} {:>5} {:<8} {:<8} {:<7}",
            template.id,
            template.name,
            template.level,
            format!("{:?}", template.generator).to_lowercase(),
            format!("{:?}", template.size).to_lowercase(),
            format!("{:?}", template.density).to_lowercase(),
        );
    }
    Ok(())
}

fn run_generate(registry: &TemplateRegistry, config: &ZoneConfig, sub: &ArgMatches) -> Result<()> {
    let template_id = required(sub, "template")?;
    let Some(template) = registry.get(template_id) else {
        bail!("Zone template '{}' not found", template_id);
    };
    let seed = resolve_seed(sub, config);

    let mut generator = ZoneGenerator::new(seed);
    let zone = generator.generate_zone(template, None);

    println!("{} (level {}, seed {})", template.name, template.level, seed);
    print_map(&render_ascii(&zone.grid, MapView::revealed(None)))?;
    println!();
    println!(
        "{} walkable cells, {} monster packs, {} exits",
        zone.grid.walkable_count(),
        zone.spawns.len(),
        zone.grid.exit_points.len()
    );
    for spawn in &zone.spawns {
        println!("  {} at {}: {}", spawn.id, spawn.position, spawn.description);
    }
    print_legend();
    Ok(())
}

fn run_simulate(registry: TemplateRegistry, config: ZoneConfig, sub: &ArgMatches) -> Result<()> {
    let template_id = required(sub, "template")?;
    let player_id = required(sub, "player")?;
    let seed = resolve_seed(sub, &config);

    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut manager = ZoneManager::with_config(registry, config).with_sink(tx);

    let access = manager.can_access_zone(template_id, player_id)?;
    if !access.allowed {
        println!("Access check failed (simulating anyway):");
        for reason in &access.unmet {
            println!("  - {}", reason);
        }
    }

    let instance = manager.create_zone_instance(template_id, player_id, InstanceConfig::with_seed(seed))?;
    let instance_id = instance.id.clone();
    let entry = instance.grid.entry_points.first().copied().unwrap_or(GridPos::new(0, 0));
    let waypoint = instance.grid.waypoint_position;
    let exit = instance.grid.exit_points.first().map(|exit| exit.position);
    let mut targets: Vec<GridPos> = instance.spawns.iter().map(|spawn| spawn.position).collect();
    targets.sort_by_key(|pos| (pos.manhattan(&entry), *pos));
    targets.dedup();
    drain_events(&mut rx);

    let arrival = manager.move_player_in_zone(&instance_id, entry)?;
    println!("You arrive: {}", arrival.description);
    for option in manager.get_available_directions(&instance_id, entry)? {
        println!("  {:<5} {}", option.direction.get_name(), option.description);
    }

    let mut experience = 0;
    for target in targets {
        let step = manager.move_player_in_zone(&instance_id, target)?;
        for pack in &step.encounters {
            println!("{} at {}", pack.description, target);
            let outcome = manager.defeat_monster_pack(&instance_id, target)?;
            experience += outcome.experience;
            println!(
                "  defeated for {} xp, loot [{}], progress {:.0}%",
                outcome.experience,
                outcome.loot.join(", "),
                outcome.progress
            );
        }
        drain_events(&mut rx);
    }

    if let Some(waypoint) = waypoint {
        let step = manager.move_player_in_zone(&instance_id, waypoint)?;
        if step.waypoint_unlocked {
            println!("Waypoint activated.");
        }
        if let WaypointOutcome::Destinations(destinations) = manager.use_waypoint(&instance_id, None)? {
            println!("{} other waypoint destinations known", destinations.len());
        }
    }
    if let Some(exit) = exit {
        let step = manager.move_player_in_zone(&instance_id, exit)?;
        if let Some(exit) = step.exit {
            println!("{} (to {})", exit.description, exit.target_zone);
        }
    }
    drain_events(&mut rx);

    println!();
    print_map(&manager.get_zone_map(&instance_id, exit.or(Some(entry)))?)?;
    println!();
    if let Some(instance) = manager.get_instance(&instance_id) {
        println!(
            "{}: {:.0}% cleared, {} xp earned, {} cells visited",
            instance.template.name,
            instance.progress,
            experience,
            instance.visited_cells.len()
        );
    }

    let removed = manager.sweep_expired_instances();
    log::debug!(
        "Expiry sweep ({} ms) removed {} instances",
        manager.config().instance_max_age_ms,
        removed
    );
    drain_events(&mut rx);
    Ok(())
}

fn required<'a>(sub: &'a ArgMatches, name: &str) -> Result<&'a str> {
    sub.get_one::<String>(name)
        .map(String::as_str)
        .with_context(|| format!("Missing argument <{}>", name))
}

fn drain_events(rx: &mut UnboundedReceiver<ZoneEvent>) {
    while let Ok(event) = rx.try_recv() {
        match event {
            ZoneEvent::InstanceCreated { instance_id, .. } => println!("* instance {} created", instance_id),
            ZoneEvent::WaypointUnlocked { template_id, .. } => println!("* waypoint unlocked in {}", template_id),
            ZoneEvent::MonsterPackDefeated { .. } => {}
            ZoneEvent::ZoneCleared { template_id, .. } => println!("* {} cleared!", template_id),
            ZoneEvent::InstancesCleaned { count } => println!("* {} instances cleaned up", count),
        }
    }
}

fn glyph_color(glyph: char) -> Color {
    match glyph {
        PLAYER_GLYPH => Color::Yellow,
        '#' => Color::DarkGrey,
        'W' => Color::Cyan,
        'E' => Color::Green,
        'C' => Color::DarkYellow,
        'H' => Color::Red,
        'B' => Color::DarkRed,
        'S' => Color::Magenta,
        'N' => Color::White,
        _ => Color::Grey,
    }
}

fn print_map(map: &str) -> Result<()> {
    let mut stdout = io::stdout();
    for line in map.lines() {
        for glyph in line.chars() {
            queue!(stdout, SetForegroundColor(glyph_color(glyph)), Print(glyph))?;
        }
        queue!(stdout, ResetColor, Print("\n"))?;
    }
    stdout.flush()?;
    Ok(())
}

fn print_legend() {
    let legend: Vec<String> = map_legend()
        .into_iter()
        .map(|(glyph, label)| format!("{} {}", glyph, label))
        .collect();
    println!("{}", legend.join("  "));
}
