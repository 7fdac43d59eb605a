// Copyright © 2018 Cormac O'Brien
//
// Permission is hereby granted, free of charge, to any person obtaining a copy
// of this software and associated documentation files (the "Software"), to deal
// in the Software without restriction, including without limitation the rights
// to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
// copies of the Software, and to permit persons to whom the Software is
// furnished to do so, subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included in
// all copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
// IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
// FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
// AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
// LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
// OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
// SOFTWARE.

extern crate brushwork;
extern crate docopt;
extern crate env_logger;
extern crate log;
#[macro_use]
extern crate serde_derive;

use std::{env, fs, fs::File, process::exit};

use brushwork::{map::MapConfig, math::Bounds, parse_map_with_textures, wad::Wad, TextureLookup};

use docopt::Docopt;
use log::LevelFilter;

#[derive(Deserialize)]
struct Args {
    arg_map: String,
    arg_wad: Vec<String>,
    flag_serial: bool,
    flag_bounds: Option<f64>,
    flag_verbose: bool,
    flag_help: bool,
    flag_version: bool,
}

const USAGE: &'static str = "
Usage: mapcheck [options] <map> [<wad>...]

Options:
        --serial      Build brushes on a single thread.
        --bounds <n>  Half extent of the world bounding cube [default: 8192].
    -v, --verbose     Produce detailed output.

    -h, --help        Show this message and exit.
        --version     Print version information and exit.
";

const VERSION: &'static str = "
mapcheck 0.1
Copyright © 2018 Cormac O'Brien
Released under the terms of the MIT License
";

fn main() {
    let args: Args = Docopt::new(USAGE)
        .and_then(|d| d.deserialize())
        .unwrap_or_else(|e| e.exit());

    if args.flag_help {
        println!("{}", USAGE);
        exit(0);
    }

    if args.flag_version {
        println!("{}", VERSION);
        exit(0);
    }

    let mut logger = env_logger::Builder::new();
    logger.filter(
        None,
        if args.flag_verbose {
            LevelFilter::Debug
        } else {
            LevelFilter::Warn
        },
    );
    if let Ok(filters) = env::var("RUST_LOG") {
        logger.parse(&filters);
    }
    logger.init();

    let mut config = MapConfig::default();
    config.parallel = !args.flag_serial;
    if let Some(extent) = args.flag_bounds {
        config.bounds = Bounds::cube(extent);
    }

    let mut wads = Vec::new();
    for path in args.arg_wad.iter() {
        let file = match File::open(path) {
            Ok(f) => f,
            Err(why) => {
                println!("Couldn't open {}: {}", path, why);
                exit(1);
            }
        };

        match Wad::load(file) {
            Ok(w) => wads.push(w),
            Err(why) => {
                println!("Couldn't load {}: {}", path, why);
                exit(1);
            }
        }
    }
    let textures: Vec<&dyn TextureLookup> =
        wads.iter().map(|w| w as &dyn TextureLookup).collect();

    let src = match fs::read_to_string(&args.arg_map) {
        Ok(s) => s,
        Err(why) => {
            println!("Couldn't read {}: {}", &args.arg_map, why);
            exit(1);
        }
    };

    let map = match parse_map_with_textures(&src, &config, &textures) {
        Ok(m) => m,
        Err(why) => {
            println!("{}: {}", &args.arg_map, why);
            exit(1);
        }
    };

    let mut invalid = 0;
    for (entity, brush) in map.invalid_brushes() {
        invalid += 1;
        let reason = match brush.geometry.invalid_reason() {
            Some(d) => d.to_string(),
            None => String::from("unknown"),
        };
        println!(
            "{}: {}: entity {} ({}) brush {}: {}",
            &args.arg_map,
            brush.position,
            entity.index,
            entity.classname().unwrap_or("no classname"),
            brush.index,
            reason
        );
    }

    for (entity, brush, diagnostic) in map.diagnostics().filter(|(_, _, d)| !d.is_fatal()) {
        println!(
            "{}: entity {} brush {}: warning: {}",
            &args.arg_map, entity, brush, diagnostic
        );
    }

    println!(
        "{}: {} entities, {} brushes, {} invalid ({:?} format)",
        &args.arg_map,
        map.entities.len(),
        map.brush_count(),
        invalid,
        map.format
    );

    if invalid > 0 {
        exit(2);
    }
}
