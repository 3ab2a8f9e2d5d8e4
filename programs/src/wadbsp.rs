use std::io::Write;

extern crate svg;
use svg::Document;
use svg::node::Node;
use svg::node::element::{Group, Line, Rectangle, Style};
extern crate termcolor;
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};
#[macro_use]
extern crate clap;
#[macro_use]
extern crate log;
extern crate simplelog;

extern crate wadbsp;
use wadbsp::errors::{Error, Result, ResultExt};
use wadbsp::geom::MapPoint;
use wadbsp::map::Level;
use wadbsp::{ConvexFan, MaterialCache, Universe, WADArchive};

/// Thing type of the player 1 start, the natural place to look at a level from.
const PLAYER1_START: i16 = 1;

fn main() {
    match run() {
        Ok(()) => {}
        Err(err) => {
            drop(write_err(err));
            std::process::exit(1);
        }
    }
}

fn write_err(err: Error) -> Result<()> {
    let mut stderr = StandardStream::stderr(ColorChoice::Auto);
    stderr.set_color(ColorSpec::new().set_fg(Some(Color::Red)).set_bold(true))?;
    write!(&mut stderr, "error: ")?;
    stderr.set_color(&ColorSpec::new())?;
    writeln!(&mut stderr, "{}", err)?;
    for cause in err.iter().skip(1) {
        writeln!(&mut stderr, "  caused by: {}", cause)?;
    }
    if let Some(backtrace) = err.backtrace() {
        writeln!(&mut stderr, "{:?}", backtrace)?;
    }
    Ok(())
}

fn run() -> Result<()> {
    let args = clap_app!(wadbsp =>
        (about: "Reads Doom IWADs and walks their levels' BSP trees")
        (@arg color: -c --color +takes_value "Choose whether to use colored output: auto, always, never")
        (@arg verbose: -v --verbose +multiple "Log more; repeat for even more")
        (@arg file: +required "Input WAD file")
        (@subcommand info =>
            (about: "Print the header and directory of a WAD")
            (@arg lumps: -l --lumps "List every directory entry")
        )
        (@subcommand levels =>
            (about: "List the levels in a WAD")
        )
        (@subcommand level =>
            (about: "Load a level and summarize it")
            (@arg name: +required "Level marker, e.g. E1M1")
            (@arg at: --at +takes_value number_of_values(2) "Also find the sector containing this point")
        )
        (@subcommand geometry =>
            (about: "Build wall and floor geometry for a level, as seen from a point")
            (@arg name: +required "Level marker, e.g. E1M1")
            (@arg at: --at +takes_value number_of_values(2) "Viewpoint; defaults to the player 1 start")
        )
        (@subcommand chart =>
            (about: "Render an SVG copy of a level")
            (@arg name: +required "Level marker, e.g. E1M1")
            (@arg outfile: +required "Output file")
        )
    ).get_matches();

    let level_filter = match args.occurrences_of("verbose") {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    let log_color = match args.value_of("color") {
        Some("always") => simplelog::ColorChoice::Always,
        Some("never") => simplelog::ColorChoice::Never,
        _ => simplelog::ColorChoice::Auto,
    };
    simplelog::TermLogger::init(
        level_filter,
        simplelog::ConfigBuilder::default().build(),
        simplelog::TerminalMode::Mixed,
        log_color,
    ).map_err(|err| Error::from(format!("couldn't set up logging: {}", err)))?;

    let filename = args.value_of("file").ok_or("no input file")?;

    // Dispatch!
    match args.subcommand() {
        ("info", Some(subargs)) => do_info(filename, subargs),
        ("levels", Some(_)) => do_levels(filename),
        ("level", Some(subargs)) => do_level(filename, subargs),
        ("geometry", Some(subargs)) => do_geometry(filename, subargs),
        ("chart", Some(subargs)) => do_chart(filename, subargs),
        _ => {
            println!("{}", args.usage());
            Ok(())
        }
    }
}

fn parse_point(subargs: &clap::ArgMatches) -> Result<Option<MapPoint>> {
    let values: Vec<_> = match subargs.values_of("at") {
        Some(values) => values.collect(),
        None => return Ok(None),
    };
    if values.len() != 2 {
        return Err("--at takes exactly two coordinates".into());
    }
    let x = values[0].parse::<i32>().chain_err(|| format!("bad x coordinate {:?}", values[0]))?;
    let y = values[1].parse::<i32>().chain_err(|| format!("bad y coordinate {:?}", values[1]))?;
    Ok(Some(MapPoint::new(x, y)))
}

fn load_level(filename: &str, subargs: &clap::ArgMatches) -> Result<(Universe, Level)> {
    let name = subargs.value_of("name").ok_or("no level name")?;
    let mut universe = Universe::open(filename)?;
    let level = universe.read_level(&name.to_uppercase())
        .chain_err(|| format!("couldn't load level {}", name))?;
    Ok((universe, level))
}

fn do_info(filename: &str, subargs: &clap::ArgMatches) -> Result<()> {
    let archive = WADArchive::open(filename)?;
    let header = archive.header();
    println!("{:?}, {} lumps, directory at {}", header.identification, header.numlumps, header.infotableofs);
    println!("{} levels", archive.level_names().len());

    if subargs.is_present("lumps") {
        for (i, entry) in archive.directory().iter().enumerate() {
            let marker = if archive.is_level_anchor(i) { " (level)" } else { "" };
            println!("{:5} {:8} {:8} @ {}{}", i, entry.name, entry.size, entry.filepos, marker);
        }
    }

    Ok(())
}

fn do_levels(filename: &str) -> Result<()> {
    let archive = WADArchive::open(filename)?;
    for name in archive.level_names() {
        println!("{}", name);
    }
    Ok(())
}

fn do_level(filename: &str, subargs: &clap::ArgMatches) -> Result<()> {
    let (_universe, level) = load_level(filename, subargs)?;
    println!("{} things", level.things().len());
    println!("{} lines, {} sides, {} vertices", level.lines().len(), level.sides().len(), level.vertices().len());
    println!("{} segs, {} subsectors, {} nodes", level.segs().len(), level.subsectors().len(), level.nodes().len());
    println!("{} sectors", level.sectors().len());
    let bbox = level.bbox();
    println!("extent ({}, {}) to ({}, {})", bbox.min_x(), bbox.min_y(), bbox.max_x(), bbox.max_y());

    if let Some(point) = parse_point(subargs)? {
        match wadbsp::find_sector(&level, point)? {
            Some(handle) => {
                let sector = level.sector(handle);
                println!(
                    "({}, {}) is in sector {}: floor {} {}, ceiling {} {}, light {}",
                    point.x, point.y, handle.index(),
                    sector.floor_height, sector.floor_texture,
                    sector.ceiling_height, sector.ceiling_texture,
                    sector.light);
            }
            None => {
                println!("({}, {}) isn't in any sector", point.x, point.y);
            }
        }
    }

    Ok(())
}

fn default_viewpoint(level: &Level) -> MapPoint {
    match level.things().iter().find(|thing| thing.doomednum == PLAYER1_START) {
        Some(thing) => thing.point,
        None => {
            warn!("no player start; looking from the middle of the level");
            let bbox = level.bbox();
            MapPoint::new(bbox.min_x() + bbox.size.width / 2, bbox.min_y() + bbox.size.height / 2)
        }
    }
}

fn do_geometry(filename: &str, subargs: &clap::ArgMatches) -> Result<()> {
    let (universe, level) = load_level(filename, subargs)?;
    let viewpoint = match parse_point(subargs)? {
        Some(point) => point,
        None => default_viewpoint(&level),
    };

    let mut cache = MaterialCache::new(&universe);
    let scene = wadbsp::build_scene(&level, viewpoint, &mut cache, &ConvexFan)?;

    let triangles: usize = scene.floors.iter().map(|floor| floor.vertices.len() / 3).sum();
    println!("viewpoint ({}, {})", viewpoint.x, viewpoint.y);
    println!("{} wall quads across {} subsectors", scene.wall_count(), scene.walls.len());
    println!("{} floor meshes, {} triangles", scene.floors.len(), triangles);
    println!("{} textures and {} flats cached", cache.texture_count(), cache.flat_count());
    Ok(())
}

fn do_chart(filename: &str, subargs: &clap::ArgMatches) -> Result<()> {
    let (_universe, level) = load_level(filename, subargs)?;
    let outfile = subargs.value_of("outfile").ok_or("no output file")?;
    let doc = level_as_svg(&level);
    svg::save(outfile, &doc)?;
    Ok(())
}

fn level_as_svg(level: &Level) -> Document {
    let mut group = Group::new();
    let bbox = level.bbox();

    let mut classes = Vec::new();
    for line in level.lines() {
        classes.clear();
        let (v0, v1) = level.line_endpoints(line);
        classes.push("line");
        match (line.front, line.back) {
            (None, None) => classes.push("zero-sided"),
            (Some(_), Some(_)) => classes.push("two-sided"),
            _ => classes.push("one-sided"),
        }
        if line.has_special() {
            classes.push("has-special");
        }
        if line.flags.contains(wadbsp::map::LineFlags::BLOCKING) {
            classes.push("blocking");
        }

        group.append(
            Line::new()
            .set("x1", v0.x)
            .set("y1", v0.y)
            .set("x2", v1.x)
            .set("y2", v1.y)
            .set("class", classes.join(" "))
        );
    }

    for thing in level.things() {
        let point = thing.point;
        let class = if thing.doomednum == PLAYER1_START { "thing player-start" } else { "thing" };
        group.append(
            Rectangle::new()
            .set("x", point.x - 8)
            .set("y", point.y - 8)
            .set("width", 16)
            .set("height", 16)
            .set("class", class));
    }

    // Doom's y-axis points up, but SVG's points down, so flip the whole level at once
    group.assign("transform", "scale(1 -1)");
    Document::new()
        .set("viewBox", (bbox.min_x(), -bbox.max_y(), bbox.size.width, bbox.size.height))
        .add(Style::new(include_str!("map-svg.css")))
        .add(group)
}
