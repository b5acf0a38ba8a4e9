use crate::{
    error::Error,
    events::{self, Event, Events},
    sweep::{Coordinate, GameState, MineField, Tile},
};
use num_traits::ToPrimitive;
use ratatui::{
    backend::TermionBackend,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::Span,
    widgets::{Block, BorderType, Borders, Clear, Gauge, List, ListItem, Paragraph},
    Terminal,
};
use std::{
    fmt, io,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};
use termion::{
    event::{Event as TermEvent, Key, MouseButton, MouseEvent},
    input::MouseTerminal,
    raw::IntoRawMode,
    screen::IntoAlternateScreen,
};
use tracing::{debug, info, warn};

fn centered_rect(width: u16, height: u16, r: Rect) -> Rect {
    let Rect {
        width: grid_width,
        height: grid_height,
        ..
    } = r;
    let vertical_pad = (grid_height / 2).saturating_sub(height / 2);
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints(
            [
                Constraint::Length(vertical_pad),
                Constraint::Length(height),
                Constraint::Length(vertical_pad),
            ]
            .as_ref(),
        )
        .split(r);

    let horizontal_pad = (grid_width / 2).saturating_sub(width / 2);
    Layout::default()
        .direction(Direction::Horizontal)
        .constraints(
            [
                Constraint::Length(horizontal_pad),
                Constraint::Length(width),
                Constraint::Length(horizontal_pad),
            ]
            .as_ref(),
        )
        .split(popup_layout[1])[1]
}

fn align_strings_to_char(strings: &[&str], c: char) -> Vec<String> {
    let (firsts, rests): (Vec<_>, Vec<_>) = strings
        .iter()
        .map(|&s| s.split_at(s.find(c).unwrap_or(s.len())))
        .unzip();
    let max_firsts = firsts.iter().map(|f| f.chars().count()).max().unwrap_or(0);
    let max_rests = rests.iter().map(|r| r.chars().count()).max().unwrap_or(0);
    firsts
        .into_iter()
        .zip(rests)
        .map(|(first, rest)| format!("{first:>max_firsts$}{rest:<max_rests$}"))
        .collect()
}

/// Map a 1-based terminal position onto the grid whose top-left cell starts
/// at the 0-based `origin`. Positions above or left of the grid come out
/// negative.
fn grid_position(
    (x, y): (u16, u16),
    origin: (u16, u16),
    (cell_width, cell_height): (u16, u16),
) -> (i64, i64) {
    let axis = |position: u16, start: u16, size: u16| {
        (i64::from(position) - 1 - i64::from(start)).div_euclid(i64::from(size))
    };
    (
        axis(x, origin.0, cell_width),
        axis(y, origin.1, cell_height),
    )
}

/// The top-left cell of a grid drawn into `area`, or `None` when the area is
/// squeezed below `grid_size` and cells no longer have their full size.
fn full_size_origin(area: Rect, (grid_width, grid_height): (u16, u16)) -> Option<(u16, u16)> {
    (area.width >= grid_width && area.height >= grid_height).then_some((area.x + 1, area.y + 1))
}

#[derive(typed_builder::TypedBuilder)]
pub(crate) struct Ui {
    minefield: MineField,
    cell_width: u16,
    cell_height: u16,
    #[builder(default)]
    events: events::Config,
}

const BOMB: &str = "💣";
const FLAG: &str = "⛳";

struct App {
    field: MineField,
    active_column: usize,
    active_row: usize,
    cell_size: (u16, u16),
    // terminal position of the top-left grid cell, known after the first draw
    grid_origin: Option<(u16, u16)>,
}

struct Cell<'app> {
    app: &'app App,
    column: usize,
    row: usize,
}

impl<'app> Cell<'app> {
    fn new(app: &'app App, column: usize, row: usize) -> Self {
        Self { app, column, row }
    }

    fn tile(&self) -> &'app Tile {
        self.app.field.tile(self.column, self.row)
    }

    fn is_active(&self) -> bool {
        self.app.active() == (self.column, self.row)
    }

    fn is_revealed(&self) -> bool {
        self.tile().is_revealed()
    }

    fn is_mine(&self) -> bool {
        self.tile().is_mine()
    }

    fn block(&self, lost: bool) -> Block<'static> {
        Block::default()
            .borders(Borders::ALL)
            .style(
                Style::default()
                    .bg(Color::Black)
                    .fg(if self.is_active() {
                        Color::Cyan
                    } else if lost && self.is_mine() {
                        Color::LightRed
                    } else {
                        Color::White
                    })
                    .add_modifier(if self.is_active() {
                        Modifier::BOLD
                    } else {
                        Modifier::empty()
                    }),
            )
            .border_type(BorderType::Rounded)
    }

    fn text_style(&self) -> Style {
        Style::default()
            .fg(if self.is_revealed() && self.is_mine() {
                Color::LightYellow
            } else if self.is_revealed() {
                Color::White
            } else {
                Color::Black
            })
            .bg(if self.is_revealed() {
                Color::Black
            } else if self.is_active() {
                Color::Cyan
            } else {
                Color::White
            })
    }
}

impl fmt::Display for Cell<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tile = self.tile();
        if tile.is_flagged() {
            f.write_str(FLAG)
        } else if tile.is_revealed() && tile.is_mine() {
            f.write_str(BOMB)
        } else {
            match tile.neighbouring_mines() {
                Some(count) if tile.is_revealed() && count > 0 => write!(f, "{count}"),
                _ => f.write_str(" "),
            }
        }
    }
}

impl App {
    fn new(field: MineField, cell_size: (u16, u16)) -> Self {
        Self {
            field,
            active_column: 0,
            active_row: 0,
            cell_size,
            grid_origin: None,
        }
    }

    fn up(&mut self) {
        if let Some(active_row) = self.active_row.checked_sub(1) {
            self.active_row = active_row;
        }
    }

    fn down(&mut self) {
        self.active_row += usize::from(self.active_row < self.field.height() - 1);
    }

    fn left(&mut self) {
        if let Some(active_column) = self.active_column.checked_sub(1) {
            self.active_column = active_column;
        }
    }

    fn right(&mut self) {
        self.active_column += usize::from(self.active_column < self.field.width() - 1);
    }

    fn cell(&self, (column, row): Coordinate) -> Cell<'_> {
        Cell::new(self, column, row)
    }

    fn active(&self) -> Coordinate {
        (self.active_column, self.active_row)
    }

    fn finished(&self) -> bool {
        self.field.game_state().is_finished()
    }

    fn reveal(&mut self, (column, row): Coordinate) {
        if !self.finished() {
            self.field.reveal_tile(column, row);
        }
    }

    fn toggle_flag(&mut self, (column, row): Coordinate) {
        if !self.finished() {
            self.field.toggle_flag(column, row);
        }
    }

    /// Discard the current board and deal a new one with the same parameters.
    fn restart(&mut self) -> Result<(), Error> {
        let field = MineField::new(
            self.field.width(),
            self.field.height(),
            self.field.mine_count(),
        )?;
        info!(
            width = field.width(),
            height = field.height(),
            mines = field.mine_count(),
            "starting a new game"
        );
        self.field = field;
        Ok(())
    }

    fn handle_key(&mut self, key: Key) -> Result<(), Error> {
        match key {
            // movement using arrow keys or vim movement keys
            Key::Up | Key::Char('k') => self.up(),
            Key::Down | Key::Char('j') => self.down(),
            Key::Left | Key::Char('h') => self.left(),
            Key::Right | Key::Char('l') => self.right(),
            Key::Char('f') => self.toggle_flag(self.active()),
            Key::Char(' ') => self.reveal(self.active()),
            Key::Char('r') => self.restart()?,
            _ => {}
        }
        Ok(())
    }

    fn tile_at(&self, position: (u16, u16)) -> Option<Coordinate> {
        let origin = self.grid_origin?;
        let (column, row) = grid_position(position, origin, self.cell_size);
        if !self.field.is_valid_tile(column, row) {
            warn!(column, row, "ignoring click outside the grid");
            return None;
        }
        // both are non-negative once validated
        Some((column as usize, row as usize))
    }

    fn handle_mouse(&mut self, event: MouseEvent) {
        let MouseEvent::Press(button @ (MouseButton::Left | MouseButton::Right), x, y) = event
        else {
            return;
        };
        if self.finished() {
            return;
        }
        let Some((column, row)) = self.tile_at((x, y)) else {
            return;
        };

        debug!(?button, column, row, "mouse press");
        self.active_column = column;
        self.active_row = row;
        if button == MouseButton::Left {
            self.reveal((column, row));
        } else {
            self.toggle_flag((column, row));
        }
    }
}

impl Ui {
    pub(crate) fn run(self) -> Result<(), Error> {
        let Self {
            minefield,
            cell_width,
            cell_height,
            events: events_config,
        } = self;
        let events = Events::with_config(events_config);
        let rows = minefield.height();
        let columns = minefield.width();

        let running = Arc::new(AtomicBool::new(true));
        let running_clone = running.clone();

        ctrlc::set_handler(move || {
            running_clone.store(false, Ordering::SeqCst);
        })
        .map_err(Error::SetHandler)?;

        let padding = 1;

        let grid_width = u16::try_from(usize::from(cell_width) * columns + 2 * padding)
            .map_err(Error::ConvertUsizeToU16)?;
        let grid_height = u16::try_from(usize::from(cell_height) * rows + 2 * padding)
            .map_err(Error::ConvertUsizeToU16)?;

        let row_constraints = std::iter::repeat(Constraint::Length(cell_height))
            .take(rows)
            .collect::<Vec<_>>();

        let col_constraints = std::iter::repeat(Constraint::Length(cell_width))
            .take(columns)
            .collect::<Vec<_>>();

        let cell_text_width = usize::from(cell_width) - 2;
        // 1 line for the text, 1 line each for the top and bottom of the cell == 3 lines
        // that are not eligible for padding
        let num_pad_lines = usize::from(cell_height) - 3;

        let mut app = App::new(minefield, (cell_width, cell_height));

        let stdout = io::stdout()
            .into_raw_mode()
            .map_err(Error::GetStdoutInRawMode)?
            .into_alternate_screen()
            .map_err(Error::GetAlternateScreenForMouseTerminal)?;
        let mouse_terminal = MouseTerminal::from(stdout);
        let backend = TermionBackend::new(mouse_terminal);
        let mut terminal = Terminal::new(backend).map_err(Error::CreateTerminal)?;

        while running.load(Ordering::SeqCst) {
            let mut grid_origin = None;
            terminal
                .draw(|frame| {
                    let terminal_rect = frame.size();
                    let state = app.field.game_state();
                    let lost = state == GameState::Lost;

                    let outer_block = Block::default()
                        .borders(Borders::ALL)
                        .title(Span::styled(
                            "Minesweeper",
                            Style::default()
                                .fg(Color::LightYellow)
                                .add_modifier(Modifier::BOLD),
                        ))
                        .border_type(BorderType::Rounded);
                    frame.render_widget(outer_block, terminal_rect);

                    let outer_rects = Layout::default()
                        .direction(Direction::Vertical)
                        .vertical_margin(1)
                        .horizontal_margin(1)
                        .constraints(vec![Constraint::Min(grid_height)])
                        .split(terminal_rect);

                    let mines_rect = outer_rects[0];

                    let revealed = app.field.revealed_count();
                    let safe_tiles = columns * rows - app.field.mine_count();
                    let progress = Gauge::default()
                        .block(
                            Block::default().borders(Borders::ALL).title(Span::styled(
                                "revealed",
                                Style::default()
                                    .fg(Color::LightMagenta)
                                    .add_modifier(Modifier::BOLD),
                            )),
                        )
                        .gauge_style(
                            Style::default()
                                .fg(Color::White)
                                .bg(Color::Black)
                                .add_modifier(Modifier::BOLD),
                        )
                        .label(format!("{revealed}/{safe_tiles}"))
                        .ratio(
                            (revealed.to_f64().unwrap_or_default()
                                / safe_tiles.to_f64().unwrap_or(1.0))
                            .clamp(0.0, 1.0),
                        );

                    let horizontal_pad_block_width = terminal_rect
                        .width
                        .checked_sub(grid_width)
                        .unwrap_or(terminal_rect.width)
                        / 2;
                    let mines_rects = Layout::default()
                        .direction(Direction::Horizontal)
                        .constraints(vec![
                            Constraint::Min(horizontal_pad_block_width),
                            Constraint::Length(grid_width),
                            Constraint::Min(horizontal_pad_block_width.saturating_sub(1)),
                        ])
                        .split(mines_rect);

                    let vertical_pad_block_height = mines_rect
                        .height
                        .checked_sub(grid_height)
                        .unwrap_or(mines_rect.height)
                        / 2;
                    let middle_mines_rects = Layout::default()
                        .direction(Direction::Vertical)
                        .constraints(vec![
                            Constraint::Min(vertical_pad_block_height),
                            Constraint::Length(grid_height),
                            Constraint::Min(vertical_pad_block_height),
                        ])
                        .split(mines_rects[1]);

                    let help_text_block = List::new(
                        align_strings_to_char(
                            &[
                                "reveal: left click / spacebar",
                                "flag: right click / f",
                                "movement: hjkl / ← ↓ ↑ →",
                                "new game: r",
                                "quit: q",
                            ],
                            ':',
                        )
                        .into_iter()
                        .map(|line| format!("{:^width$}", line, width = usize::from(grid_width)))
                        .map(ListItem::new)
                        .collect::<Vec<_>>(),
                    )
                    .block(Block::default().borders(Borders::NONE));
                    frame.render_widget(help_text_block, middle_mines_rects[2]);

                    let info_text_split_rects = Layout::default()
                        .direction(Direction::Vertical)
                        .constraints(vec![
                            Constraint::Min(vertical_pad_block_height.saturating_sub(3)),
                            Constraint::Length(3),
                        ])
                        .split(middle_mines_rects[0]);

                    let info_mines_rects = Layout::default()
                        .direction(Direction::Horizontal)
                        .constraints(vec![Constraint::Percentage(50), Constraint::Percentage(50)])
                        .split(info_text_split_rects[1]);
                    frame.render_widget(progress, info_mines_rects[0]);

                    let mines_text = Paragraph::new(app.field.mine_count().to_string())
                        .block(
                            Block::default().borders(Borders::ALL).title(Span::styled(
                                BOMB,
                                Style::default()
                                    .fg(Color::LightYellow)
                                    .add_modifier(Modifier::BOLD),
                            )),
                        )
                        .alignment(Alignment::Center);
                    frame.render_widget(mines_text, info_mines_rects[1]);

                    let mines_block = Block::default()
                        .borders(Borders::ALL)
                        .border_type(BorderType::Rounded);

                    let final_mines_rect = middle_mines_rects[1];
                    frame.render_widget(mines_block, final_mines_rect);
                    grid_origin = full_size_origin(final_mines_rect, (grid_width, grid_height));

                    let row_rects = Layout::default()
                        .direction(Direction::Vertical)
                        .vertical_margin(1)
                        .horizontal_margin(0)
                        .constraints(row_constraints.clone())
                        .split(final_mines_rect);

                    for (r, row_rect) in row_rects.iter().enumerate() {
                        let col_rects = Layout::default()
                            .direction(Direction::Horizontal)
                            .vertical_margin(0)
                            .horizontal_margin(1)
                            .constraints(col_constraints.clone())
                            .split(*row_rect);

                        for (c, cell_rect) in col_rects.iter().enumerate() {
                            let cell = app.cell((c, r));
                            let single_row_text =
                                format!("{:^length$}", cell.to_string(), length = cell_text_width);
                            let pad_line = " ".repeat(usize::from(cell_width));

                            let text = std::iter::repeat(pad_line.clone())
                                .take(num_pad_lines / 2)
                                .chain(std::iter::once(single_row_text))
                                .chain(std::iter::repeat(pad_line).take(num_pad_lines / 2))
                                .collect::<Vec<_>>()
                                .join("\n");

                            let cell_text = Paragraph::new(text)
                                .block(cell.block(lost))
                                .style(cell.text_style());
                            frame.render_widget(cell_text, *cell_rect);
                        }
                    }

                    if state.is_finished() {
                        let area = centered_rect(20, 3, final_mines_rect);
                        frame.render_widget(Clear, area); // this clears out the background
                        frame.render_widget(
                            Paragraph::new(if lost { "Game Over!" } else { "You Win!" })
                                .block(
                                    Block::default()
                                        .borders(Borders::ALL)
                                        .border_type(BorderType::Thick)
                                        .border_style(
                                            Style::default()
                                                .fg(if lost {
                                                    Color::Magenta
                                                } else {
                                                    Color::LightGreen
                                                })
                                                .add_modifier(Modifier::BOLD),
                                        )
                                        .style(Style::default().add_modifier(Modifier::BOLD)),
                                )
                                .alignment(Alignment::Center)
                                .style(Style::default()),
                            area,
                        );
                    }
                })
                .map_err(Error::DrawToTerminal)?;
            app.grid_origin = grid_origin;

            let Event::Input(input) = events.next().map_err(Error::GetEvent)? else {
                continue;
            };

            match input {
                TermEvent::Key(key) if key == events_config.exit_key => break,
                TermEvent::Key(key) => app.handle_key(key)?,
                TermEvent::Mouse(mouse) => app.handle_mouse(mouse),
                TermEvent::Unsupported(_) => {}
            }
        }

        Ok(())
    }
}
