use anyhow::{Context, Result};
use coinop_sdl2::App;
use coinop_sdl2::{SdlContext, SdlInitInfo};

pub enum EmulatorType {
    SpaceInvaders,
}

pub fn run(emulator: EmulatorType, rom_path: &str) -> Result<()> {
    match emulator {
        EmulatorType::SpaceInvaders => run_invaders(rom_path),
    }
}

pub fn run_invaders(rom_path: &str) -> Result<()> {
    let rom = std::fs::read(rom_path)
        .with_context(|| format!("could not open ROM image {rom_path:?}"))?;
    log::info!("loaded {} byte ROM from {rom_path}", rom.len());

    let mut app = coinop_invaders::InvadersApp::default();
    app.machine.load_rom(&rom);

    let init_info = SdlInitInfo::builder()
        .width(app.width())
        .height(app.height())
        .scale(app.scale())
        .title(app.title())
        .build();
    SdlContext::run(init_info, app)?;
    Ok(())
}
