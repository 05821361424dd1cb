use anyhow::Result;
use coinop::EmulatorType;

const DEFAULT_ROM_PATH: &str = "space-invaders/invaders";

fn main() -> Result<()> {
    env_logger::init();

    let rom_path = match std::env::args().nth(1) {
        Some(path) if !path.is_empty() => path,
        _ => {
            log::info!("No ROM path provided, using default: {DEFAULT_ROM_PATH}");
            DEFAULT_ROM_PATH.to_string()
        }
    };

    coinop::run(EmulatorType::SpaceInvaders, &rom_path)
}
