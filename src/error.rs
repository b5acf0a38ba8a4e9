#[derive(Debug, thiserror::Error)]
pub(crate) enum Error {
    #[error("board must have at least one row and one column, got {width}x{height}")]
    EmptyBoard { width: usize, height: usize },

    #[error("number of mines ({mines}) must be less than the number of cells ({cells})")]
    TooManyMines { mines: usize, cells: usize },

    #[error("board of {width}x{height} tiles is too large")]
    BoardTooLarge { width: usize, height: usize },

    #[error("mine index {index} lies outside a board of {cells} cells")]
    MineOutOfBounds { index: usize, cells: usize },

    #[error("failed to draw to terminal")]
    DrawToTerminal(#[source] std::io::Error),

    #[error("failed to get input event")]
    GetEvent(#[source] std::sync::mpsc::RecvError),

    #[error("failed to set ctrlc handler")]
    SetHandler(#[source] ctrlc::Error),

    #[error("failed to get stdout in raw mode")]
    GetStdoutInRawMode(#[source] std::io::Error),

    #[error("failed to get alternate screen for mouse terminal")]
    GetAlternateScreenForMouseTerminal(#[source] std::io::Error),

    #[error("failed to create terminal object")]
    CreateTerminal(#[source] std::io::Error),

    #[error("failed to convert usize to u16")]
    ConvertUsizeToU16(#[source] std::num::TryFromIntError),
}
