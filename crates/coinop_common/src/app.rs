use anyhow::Result;

use crate::key::Key;

/// Contract between an emulated machine and the frontend driving it.
///
/// The frontend calls `update` once per presented frame with the RGB24
/// framebuffer to fill in. Emulation faults (bad opcode, decoder bug)
/// propagate out of `update`; the frontend tears down and exits on error.
pub trait App {
    fn init(&mut self);
    fn update(&mut self, screen: &mut [u8]) -> Result<()>;
    fn handle_key_event(&mut self, key: Key, is_down: bool);
    fn should_exit(&self) -> bool;
    fn exit(&mut self);

    fn width(&self) -> u32;
    fn height(&self) -> u32;
    fn scale(&self) -> u32;
    fn title(&self) -> String;
}
