/// Logical key set shared between frontends and machines.
///
/// Frontends map their native keycodes onto this enum so that machine
/// crates never depend on a windowing library directly.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum Key {
    Num1,
    Num2,
    Num3,
    Num4,
    Q,
    W,
    E,
    R,
    A,
    S,
    D,
    F,
    Z,
    X,
    C,
    V,
    J,
    K,
    L,
    P,
    T,
    Left,
    Right,
    Up,
    Down,
    Space,
    Escape,
    None,
}
