#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Tempo used before the first tempo mark.
pub const DEFAULT_TEMPO: u16 = 90;

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TempoUnit {
    #[default]
    Quarter,
    DottedQuarter,
}

/// A tempo mark at `(bar, tick_in_bar)`.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TempoItem {
    pub bar: usize,
    pub tick_in_bar: u32,
    pub tempo: u16,
    pub unit: TempoUnit,
}

impl TempoItem {
    pub fn new(bar: usize, tick_in_bar: u32, tempo: u16) -> Self {
        Self {
            bar,
            tick_in_bar,
            tempo,
            unit: TempoUnit::Quarter,
        }
    }

    pub fn with_unit(mut self, unit: TempoUnit) -> Self {
        self.unit = unit;
        self
    }

    /// Quarter notes per minute.
    pub fn bpm(&self) -> f64 {
        match self.unit {
            TempoUnit::Quarter => self.tempo as f64,
            TempoUnit::DottedQuarter => 1.5 * self.tempo as f64,
        }
    }

    fn key(&self) -> (usize, u32) {
        (self.bar, self.tick_in_bar)
    }

    fn same_tempo(&self, other: &TempoItem) -> bool {
        self.tempo == other.tempo && self.unit == other.unit
    }
}

/// Tempo marks ordered by position.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TempoTimeline {
    items: Vec<TempoItem>,
}

impl TempoTimeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// A timeline with a single mark at the start of the song.
    pub fn constant(tempo: u16) -> Self {
        Self {
            items: vec![TempoItem::new(0, 0, tempo)],
        }
    }

    pub fn items(&self) -> &[TempoItem] {
        &self.items
    }

    pub fn item(&self, index: usize) -> Option<&TempoItem> {
        self.items.get(index)
    }

    /// Index of the last mark at or before `(bar, tick_in_bar)`, and whether
    /// it sits exactly there.
    pub fn index_of_item_at(&self, bar: usize, tick_in_bar: u32) -> Option<(usize, bool)> {
        let key = (bar, tick_in_bar);
        let after = self.items.partition_point(|item| item.key() <= key);
        let index = after.checked_sub(1)?;
        Some((index, self.items[index].key() == key))
    }

    /// Mark in force at `(bar, tick_in_bar)`.
    pub fn item_at(&self, bar: usize, tick_in_bar: u32) -> Option<&TempoItem> {
        self.index_of_item_at(bar, tick_in_bar)
            .and_then(|(index, _)| self.items.get(index))
    }

    pub fn bpm_at(&self, bar: usize, tick_in_bar: u32, default_bpm: f64) -> f64 {
        self.item_at(bar, tick_in_bar).map_or(default_bpm, TempoItem::bpm)
    }

    /// Insert `item`, replacing a mark at exactly the same position.
    pub fn insert_item(&mut self, item: TempoItem) {
        match self.index_of_item_at(item.bar, item.tick_in_bar) {
            Some((index, true)) => self.items[index] = item,
            Some((index, false)) => self.items.insert(index + 1, item),
            None => self.items.insert(0, item),
        }
    }

    pub fn insert(mut self, item: TempoItem) -> Self {
        self.insert_item(item);
        self
    }

    /// Shift marks for a bar inserted at `bar`.
    pub fn insert_bar_at(&mut self, bar: usize) {
        let Some(first) = self.items.first().copied() else {
            return;
        };
        for item in &mut self.items {
            if item.bar >= bar {
                item.bar += 1;
            }
        }
        if bar == 0 {
            self.items.insert(0, first);
        }
    }

    /// Shift marks for the bar removed at `bar`; the song keeps an opening mark.
    pub fn remove_bar_at(&mut self, bar: usize) {
        self.remove_bars(bar, 1);
    }

    pub fn remove_bars(&mut self, bar: usize, count: usize) {
        let Some(first) = self.items.first().copied() else {
            return;
        };
        self.remove_items_in_bar_range(bar, bar + count.saturating_sub(1));
        for item in &mut self.items {
            if item.bar >= bar {
                item.bar -= count;
            }
        }
        if bar == 0 && self.item_at(0, 0).is_none() {
            self.items.insert(0, TempoItem { bar: 0, tick_in_bar: 0, ..first });
        }
    }

    pub fn remove_items_in_bar_range(&mut self, first_bar: usize, last_bar: usize) {
        self.items.retain(|item| !(first_bar..=last_bar).contains(&item.bar));
    }

    pub fn has_item_in_bar_range(&self, first_bar: usize, last_bar: usize) -> bool {
        self.items
            .iter()
            .any(|item| (first_bar..=last_bar).contains(&item.bar))
    }

    /// Drop marks that repeat the tempo of the mark before them.
    pub fn remove_identical_siblings(&mut self) {
        self.items.dedup_by(|next, prev| next.same_tempo(prev));
    }
}
