//! Navigation state for the deck picker: a paginated thumbnail grid with a
//! three-button toolbar (previous page / return home / next page) below it.
//!
//! Selection is confined to the current page: directional input never moves
//! the selected tile onto another page, only an explicit page change does.

/// Which toolbar button currently holds focus, if any.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolbarFocus {
    /// Focus is on the tile grid, not the toolbar.
    None,
    PrevPage,
    ReturnHome,
    NextPage,
}

/// A directional or activation command, already normalized from input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavCommand {
    Left,
    Right,
    Up,
    Down,
    Select,
}

/// What a `Select` resolved to. Page changes are handled internally.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PickerAction {
    None,
    /// Launch the deck at this absolute catalog index.
    LaunchDeck(usize),
    /// The "return to main menu" toolbar button was confirmed.
    ReturnHome,
}

/// Grid dimensions of one picker page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridGeometry {
    pub tiles_per_row: usize,
    pub rows_per_page: usize,
}

impl GridGeometry {
    pub fn page_size(&self) -> usize {
        self.tiles_per_row * self.rows_per_page
    }
}

#[derive(Debug, Clone)]
pub struct PickerState {
    geometry: GridGeometry,
    catalog_size: usize,
    /// Current page index, 0-based.
    pub page: usize,
    /// Selected tile as an absolute index into the full catalog.
    pub selected: usize,
    pub toolbar: ToolbarFocus,
}

impl PickerState {
    pub fn new(geometry: GridGeometry, catalog_size: usize) -> Self {
        Self {
            geometry,
            catalog_size,
            page: 0,
            selected: 0,
            toolbar: ToolbarFocus::None,
        }
    }

    /// Back to page 0, first tile, grid focus. Called whenever the mode
    /// machine enters the picker.
    pub fn reset(&mut self) {
        self.page = 0;
        self.selected = 0;
        self.toolbar = ToolbarFocus::None;
    }

    pub fn geometry(&self) -> GridGeometry {
        self.geometry
    }

    pub fn catalog_size(&self) -> usize {
        self.catalog_size
    }

    pub fn page_count(&self) -> usize {
        self.catalog_size.div_ceil(self.geometry.page_size()).max(1)
    }

    /// Absolute index of the first tile on the current page.
    pub fn page_start(&self) -> usize {
        self.page * self.geometry.page_size()
    }

    /// One past the last occupied tile on the current page.
    pub fn page_end(&self) -> usize {
        (self.page_start() + self.geometry.page_size()).min(self.catalog_size)
    }

    pub fn apply(&mut self, command: NavCommand) -> PickerAction {
        match command {
            NavCommand::Left => {
                self.move_left();
                PickerAction::None
            }
            NavCommand::Right => {
                self.move_right();
                PickerAction::None
            }
            NavCommand::Up => {
                self.move_up();
                PickerAction::None
            }
            NavCommand::Down => {
                self.move_down();
                PickerAction::None
            }
            NavCommand::Select => self.select(),
        }
    }

    fn move_left(&mut self) {
        match self.toolbar {
            ToolbarFocus::None => {
                // Confined to the page: no-op at the page's first tile.
                if self.selected > self.page_start() {
                    self.selected -= 1;
                }
            }
            ToolbarFocus::ReturnHome => self.toolbar = ToolbarFocus::PrevPage,
            ToolbarFocus::NextPage => self.toolbar = ToolbarFocus::ReturnHome,
            ToolbarFocus::PrevPage => {}
        }
    }

    fn move_right(&mut self) {
        match self.toolbar {
            ToolbarFocus::None => {
                if self.selected + 1 < self.page_end() {
                    self.selected += 1;
                }
            }
            ToolbarFocus::PrevPage => self.toolbar = ToolbarFocus::ReturnHome,
            ToolbarFocus::ReturnHome => self.toolbar = ToolbarFocus::NextPage,
            ToolbarFocus::NextPage => {}
        }
    }

    fn move_up(&mut self) {
        if self.toolbar != ToolbarFocus::None {
            // Toolbar hands focus back to the grid; selection is unchanged
            // and still lies on the current page.
            self.toolbar = ToolbarFocus::None;
            return;
        }
        let offset = self.selected - self.page_start();
        if offset < self.geometry.tiles_per_row {
            self.toolbar = ToolbarFocus::PrevPage;
        } else {
            self.selected -= self.geometry.tiles_per_row;
        }
    }

    fn move_down(&mut self) {
        if self.toolbar != ToolbarFocus::None {
            self.toolbar = ToolbarFocus::PrevPage;
            return;
        }
        let last_occupied = match self.page_end().checked_sub(1) {
            Some(last) => last,
            None => {
                self.toolbar = ToolbarFocus::PrevPage;
                return;
            }
        };
        if self.selected + self.geometry.tiles_per_row <= last_occupied {
            self.selected += self.geometry.tiles_per_row;
        } else {
            self.toolbar = ToolbarFocus::PrevPage;
        }
    }

    fn select(&mut self) -> PickerAction {
        match self.toolbar {
            ToolbarFocus::PrevPage => {
                self.prev_page();
                PickerAction::None
            }
            ToolbarFocus::NextPage => {
                self.next_page();
                PickerAction::None
            }
            ToolbarFocus::ReturnHome => PickerAction::ReturnHome,
            ToolbarFocus::None => {
                if self.selected < self.catalog_size {
                    PickerAction::LaunchDeck(self.selected)
                } else {
                    PickerAction::None
                }
            }
        }
    }

    /// Advance a page; no-op on the last page. Selection resets to the new
    /// page's first tile.
    fn next_page(&mut self) {
        if (self.page + 1) * self.geometry.page_size() < self.catalog_size {
            self.page += 1;
            self.selected = self.page_start();
        }
    }

    /// Go back a page; no-op on page 0.
    fn prev_page(&mut self) {
        if self.page > 0 {
            self.page -= 1;
            self.selected = self.page_start();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn geometry() -> GridGeometry {
        GridGeometry {
            tiles_per_row: 4,
            rows_per_page: 3,
        }
    }

    fn picker(catalog_size: usize) -> PickerState {
        PickerState::new(geometry(), catalog_size)
    }

    #[test]
    fn left_at_first_tile_is_noop() {
        let mut p = picker(10);
        p.apply(NavCommand::Left);
        assert_eq!(p.selected, 0);
        assert_eq!(p.toolbar, ToolbarFocus::None);
    }

    #[test]
    fn right_stops_at_last_occupied_tile() {
        let mut p = picker(3);
        for _ in 0..10 {
            p.apply(NavCommand::Right);
        }
        assert_eq!(p.selected, 2);
    }

    #[test]
    fn up_from_top_row_focuses_prev_page() {
        let mut p = picker(10);
        p.selected = 2;
        p.apply(NavCommand::Up);
        assert_eq!(p.toolbar, ToolbarFocus::PrevPage);
        assert_eq!(p.selected, 2, "selection survives toolbar focus");
    }

    #[test]
    fn up_from_lower_row_moves_one_row_up() {
        let mut p = picker(10);
        p.selected = 6;
        p.apply(NavCommand::Up);
        assert_eq!(p.selected, 2);
        assert_eq!(p.toolbar, ToolbarFocus::None);
    }

    #[test]
    fn down_from_row_two_of_ten_decks_focuses_toolbar() {
        // 10 decks, 4x3 grid: single page. Tile 9 sits on row 2 with no
        // occupied tile below it.
        let mut p = picker(10);
        assert_eq!(p.page_count(), 1);
        p.selected = 9;
        p.apply(NavCommand::Down);
        assert_eq!(p.toolbar, ToolbarFocus::PrevPage);
    }

    #[test]
    fn down_moves_a_full_row_when_occupied() {
        let mut p = picker(10);
        p.selected = 1;
        p.apply(NavCommand::Down);
        assert_eq!(p.selected, 5);
        p.apply(NavCommand::Down);
        assert_eq!(p.selected, 9);
    }

    #[test]
    fn toolbar_cycles_bounded_without_wraparound() {
        let mut p = picker(10);
        p.apply(NavCommand::Up); // top row -> PrevPage
        assert_eq!(p.toolbar, ToolbarFocus::PrevPage);
        p.apply(NavCommand::Left);
        assert_eq!(p.toolbar, ToolbarFocus::PrevPage, "no wrap to the left");
        p.apply(NavCommand::Right);
        assert_eq!(p.toolbar, ToolbarFocus::ReturnHome);
        p.apply(NavCommand::Right);
        assert_eq!(p.toolbar, ToolbarFocus::NextPage);
        p.apply(NavCommand::Right);
        assert_eq!(p.toolbar, ToolbarFocus::NextPage, "no wrap to the right");
    }

    #[test]
    fn toolbar_up_returns_to_grid_and_down_forces_prev_page() {
        let mut p = picker(10);
        p.apply(NavCommand::Up);
        p.apply(NavCommand::Right); // ReturnHome
        p.apply(NavCommand::Down);
        assert_eq!(p.toolbar, ToolbarFocus::PrevPage);
        p.apply(NavCommand::Up);
        assert_eq!(p.toolbar, ToolbarFocus::None);
    }

    #[test]
    fn select_dispatches_by_focus() {
        let mut p = picker(10);
        p.selected = 3;
        assert_eq!(p.apply(NavCommand::Select), PickerAction::LaunchDeck(3));

        p.apply(NavCommand::Up);
        p.apply(NavCommand::Right); // ReturnHome
        assert_eq!(p.apply(NavCommand::Select), PickerAction::ReturnHome);
    }

    #[test]
    fn page_boundaries_are_noops() {
        let mut p = picker(30); // 3 pages of 12
        p.apply(NavCommand::Up); // PrevPage
        assert_eq!(p.apply(NavCommand::Select), PickerAction::None);
        assert_eq!(p.page, 0, "prev page at page 0 is a no-op");

        p.apply(NavCommand::Right);
        p.apply(NavCommand::Right); // NextPage
        p.apply(NavCommand::Select);
        assert_eq!(p.page, 1);
        assert_eq!(p.selected, 12, "selection resets to new page's first tile");
        p.apply(NavCommand::Select);
        assert_eq!(p.page, 2);
        p.apply(NavCommand::Select);
        assert_eq!(p.page, 2, "next page at last page is a no-op");
    }

    #[test]
    fn prev_page_resets_selection_to_page_start() {
        let mut p = picker(30);
        p.apply(NavCommand::Up);
        p.apply(NavCommand::Right);
        p.apply(NavCommand::Right);
        p.apply(NavCommand::Select); // page 1
        p.apply(NavCommand::Up); // back to grid
        p.apply(NavCommand::Right);
        assert_eq!(p.selected, 13);
        p.apply(NavCommand::Up); // PrevPage focus
        p.apply(NavCommand::Select); // page 0
        assert_eq!(p.page, 0);
        assert_eq!(p.selected, 0);
    }

    #[test]
    fn empty_catalog_never_launches() {
        let mut p = picker(0);
        assert_eq!(p.apply(NavCommand::Select), PickerAction::None);
        p.apply(NavCommand::Down);
        assert_eq!(p.toolbar, ToolbarFocus::PrevPage);
    }

    #[test]
    fn partial_last_page_confines_selection() {
        let mut p = picker(14); // page 1 holds tiles 12..14
        p.apply(NavCommand::Up);
        p.apply(NavCommand::Right);
        p.apply(NavCommand::Right);
        p.apply(NavCommand::Select);
        assert_eq!(p.page, 1);
        for _ in 0..6 {
            p.apply(NavCommand::Right);
        }
        assert_eq!(p.selected, 13, "right stops at last occupied tile");
        p.apply(NavCommand::Down);
        assert_eq!(p.toolbar, ToolbarFocus::PrevPage);
    }

    // Small xorshift so the sequence is deterministic across runs.
    fn next_rand(state: &mut u64) -> u64 {
        let mut x = *state;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        *state = x;
        x
    }

    #[test]
    fn selection_stays_on_page_under_random_commands() {
        let commands = [
            NavCommand::Left,
            NavCommand::Right,
            NavCommand::Up,
            NavCommand::Down,
            NavCommand::Select,
        ];
        for catalog_size in [1, 5, 10, 12, 13, 25, 100] {
            let mut p = picker(catalog_size);
            let mut seed = 0x9E37_79B9_7F4A_7C15u64 ^ catalog_size as u64;
            for _ in 0..2000 {
                let cmd = commands[(next_rand(&mut seed) % 5) as usize];
                p.apply(cmd);
                if p.toolbar == ToolbarFocus::None {
                    assert!(
                        p.selected >= p.page_start() && p.selected < p.page_end(),
                        "selected {} outside page {} bounds [{}, {}) for size {}",
                        p.selected,
                        p.page,
                        p.page_start(),
                        p.page_end(),
                        catalog_size
                    );
                }
                assert!(p.page < p.page_count());
            }
        }
    }
}
