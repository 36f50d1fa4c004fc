mod cli;

use anyhow::Result;
use clap::Command;

pub mod consts {
    pub const VERSION: &str = env!("CARGO_PKG_VERSION");
    pub const BIN_NAME: &str = "cellspace";
}

fn build_parser() -> Command {
    Command::new(consts::BIN_NAME)
        .bin_name(consts::BIN_NAME)
        .version(consts::VERSION)
        .about("Phenotype selection and spatial statistics for cell segmentation tables.")
        .subcommand_required(true)
        .subcommand(cli::create_within_cli())
        .subcommand(cli::create_nearest_cli())
        .subcommand(cli::create_batch_cli())
}

fn main() -> Result<()> {
    env_logger::init();

    let matches = build_parser().get_matches();

    match matches.subcommand() {
        Some((cli::WITHIN_CMD, matches)) => cli::run_within(matches)?,
        Some((cli::NEAREST_CMD, matches)) => cli::run_nearest(matches)?,
        Some((cli::BATCH_CMD, matches)) => cli::run_batch(matches)?,
        _ => unreachable!("Subcommand not found"),
    };

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parser_is_consistent() {
        build_parser().debug_assert();
    }

    #[test]
    fn within_collects_repeated_radii() {
        let matches = build_parser()
            .try_get_matches_from([
                "cellspace", "within", "field.txt", "--from", "CD8+", "--to", "CK+", "--radius",
                "10", "--radius", "25",
            ])
            .unwrap();
        let (_, sub) = matches.subcommand().unwrap();
        let radii: Vec<f64> = sub.get_many::<f64>("radius").unwrap().copied().collect();
        assert_eq!(radii, vec![10.0, 25.0]);
    }
}
