//! Performance order of a song.
//!
//! [`PlaylistCompiler`] walks the bars the way a player reads the score:
//! repeat signs, alternate endings, Da Capo / Dal Segno jumps with their
//! Fine and Coda variants. The result is a flat list of bar indices that
//! [`Playlist`] turns into tick-positioned [`PlaylistBar`]s.

use std::fmt;

use log::warn;

use super::song::{Bar, DirectionJump, DirectionTarget, Song};

/// A direction written more than once. The first occurrence is kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompileWarning {
    DuplicateJump { jump: DirectionJump, bar: usize },
    DuplicateTarget { target: DirectionTarget, bar: usize },
}

impl fmt::Display for CompileWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompileWarning::DuplicateJump { jump, bar } => {
                write!(f, "Duplicate direction jump {:?} at bar {}, keeping the first one", jump, bar)
            }
            CompileWarning::DuplicateTarget { target, bar } => {
                write!(f, "Duplicate direction target {:?} at bar {}, keeping the first one", target, bar)
            }
        }
    }
}

#[derive(Debug, Default)]
pub struct PlaylistCompiler {
    bar_index: usize,
    iteration: u32,
    repeat_start: usize,
    jumped_from_repeat_end: bool,
    jump_at_coda: bool,
    jump_at_double_coda: bool,
    stops_at_fine: bool,
    /// Bar of each not-yet-consumed jump instruction.
    jumps: [Option<usize>; DirectionJump::COUNT],
    targets: [Option<usize>; DirectionTarget::COUNT],
    warnings: Vec<CompileWarning>,
}

impl PlaylistCompiler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Diagnostics from the last [`compile`](Self::compile).
    pub fn warnings(&self) -> &[CompileWarning] {
        &self.warnings
    }

    pub fn compile(&mut self, bars: &[Bar]) -> Vec<usize> {
        *self = Self::default();
        self.collect_directions(bars);

        let mut playlist = Vec::with_capacity(bars.len() * 4);
        while self.bar_index < bars.len() {
            let bar = &bars[self.bar_index];

            if bar.has_alternate_endings() && !plays_ending(bar, self.iteration) {
                self.advance();
                continue;
            }
            playlist.push(self.bar_index);

            if bar.repeat_start && !self.jumped_from_repeat_end {
                self.iteration = 0;
                self.repeat_start = self.bar_index;
            }

            if bar.repeat_end {
                let last_iteration = bar.repeat_count.max(2) as u32 - 1;
                // an alternate ending on the closing bar overrides the repeat count
                if bar.has_alternate_endings() || self.iteration < last_iteration {
                    self.bar_index = self.repeat_start;
                    self.iteration += 1;
                    self.jumped_from_repeat_end = true;
                } else {
                    self.advance();
                }
            } else if !self.follow_jump(bar) {
                if self.stops_at_fine && bar.has_target(DirectionTarget::Fine) {
                    break;
                }
                self.advance();
            }
        }
        playlist
    }

    fn collect_directions(&mut self, bars: &[Bar]) {
        for (index, bar) in bars.iter().enumerate() {
            for jump in DirectionJump::ALL {
                if !bar.has_jump(jump) {
                    continue;
                }
                match self.jumps[jump.index()] {
                    None => self.jumps[jump.index()] = Some(index),
                    Some(_) => self.warn(CompileWarning::DuplicateJump { jump, bar: index }),
                }
            }
            for target in DirectionTarget::ALL {
                if !bar.has_target(target) {
                    continue;
                }
                match self.targets[target.index()] {
                    None => self.targets[target.index()] = Some(index),
                    Some(_) => self.warn(CompileWarning::DuplicateTarget { target, bar: index }),
                }
            }
        }
    }

    fn warn(&mut self, warning: CompileWarning) {
        warn!("{}", warning);
        self.warnings.push(warning);
    }

    /// Take the first applicable jump on `bar`. Returns `false` if none applies.
    fn follow_jump(&mut self, bar: &Bar) -> bool {
        use DirectionJump::*;

        const FROM_START: [DirectionJump; 4] = [DaCapo, DaCapoAlFine, DaCapoAlCoda, DaCapoAlDoubleCoda];
        const FROM_SEGNO: [DirectionJump; 4] = [DalSegno, DalSegnoAlFine, DalSegnoAlCoda, DalSegnoAlDoubleCoda];
        const FROM_SEGNO_SEGNO: [DirectionJump; 4] = [
            DalSegnoSegno,
            DalSegnoSegnoAlFine,
            DalSegnoSegnoAlCoda,
            DalSegnoSegnoAlDoubleCoda,
        ];

        let groups = [
            (FROM_START, Some(0)),
            (FROM_SEGNO, self.targets[DirectionTarget::Segno.index()]),
            (FROM_SEGNO_SEGNO, self.targets[DirectionTarget::SegnoSegno.index()]),
        ];
        for (variants, destination) in groups {
            for (variant, jump) in variants.into_iter().enumerate() {
                let Some(destination) = destination else {
                    continue;
                };
                if !self.pending(bar, jump) {
                    continue;
                }
                self.jump_to(destination, jump);
                match variant {
                    1 => self.stops_at_fine = true,
                    2 => self.jump_at_coda = true,
                    3 => self.jump_at_double_coda = true,
                    _ => {}
                }
                return true;
            }
        }

        if self.jump_at_coda && self.pending(bar, ToCoda) {
            if let Some(coda) = self.targets[DirectionTarget::Coda.index()] {
                self.jump_to(coda, ToCoda);
                self.jump_at_coda = false;
                return true;
            }
        }
        if self.jump_at_double_coda && self.pending(bar, ToDoubleCoda) {
            if let Some(coda) = self.targets[DirectionTarget::DoubleCoda.index()] {
                self.jump_to(coda, ToDoubleCoda);
                self.jump_at_double_coda = false;
                return true;
            }
        }
        false
    }

    fn pending(&self, bar: &Bar, jump: DirectionJump) -> bool {
        self.jumps[jump.index()].is_some() && bar.has_jump(jump)
    }

    fn jump_to(&mut self, bar_index: usize, consumed: DirectionJump) {
        self.jumps[consumed.index()] = None;
        self.bar_index = bar_index;
        self.iteration = 0;
        self.jumped_from_repeat_end = false;
    }

    fn advance(&mut self) {
        self.bar_index += 1;
        self.jumped_from_repeat_end = false;
    }
}

fn plays_ending(bar: &Bar, iteration: u32) -> bool {
    1u8.checked_shl(iteration)
        .is_some_and(|bit| bar.alternate_endings & bit != 0)
}

/// Which range of a [`PlaylistBar`] a tick window touched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intersection {
    Normal,
    /// Only the overhang of notes sounding before or after the bar.
    Extended,
}

/// One performed instance of a song bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaylistBar {
    pub bar_index: usize,
    /// Start tick in the playlist.
    pub tick: i64,
    pub duration: i64,
    pub extended_tick: i64,
    pub extended_duration: i64,
}

impl PlaylistBar {
    fn new(bar_index: usize, tick: i64, duration: i64) -> Self {
        Self {
            bar_index,
            tick,
            duration,
            extended_tick: tick,
            extended_duration: duration,
        }
    }

    pub fn end_tick(&self) -> i64 {
        self.tick + self.duration
    }

    /// Test the half-open tick window `[t0, t1)` against the bar.
    pub fn intersects(&self, t0: f64, t1: f64) -> Option<Intersection> {
        let start = self.tick as f64;
        let end = start + self.duration as f64;
        let extended_start = self.extended_tick as f64;
        let extended_end = extended_start + self.extended_duration as f64;

        if start < t1 && end >= t0 {
            Some(Intersection::Normal)
        } else if extended_start < t1 && extended_end >= t0 {
            Some(Intersection::Extended)
        } else {
            None
        }
    }

    /// Grow the extended range to cover `before` ticks ahead of the bar and
    /// `after` ticks past its end.
    pub fn extend(&mut self, before: i64, after: i64) {
        let start = self.extended_tick.min(self.tick - before.max(0));
        let end = (self.extended_tick + self.extended_duration).max(self.end_tick() + after.max(0));
        self.extended_tick = start;
        self.extended_duration = end - start;
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Playlist {
    bars: Vec<PlaylistBar>,
    duration: i64,
}

impl Playlist {
    pub fn from_song(song: &Song) -> Self {
        Self::from_bars(&song.bars)
    }

    pub fn from_bars(bars: &[Bar]) -> Self {
        let order = PlaylistCompiler::new().compile(bars);
        Self::from_order(bars, &order)
    }

    /// Position bars of `song_bars` in the given performance `order`.
    pub fn from_order(song_bars: &[Bar], order: &[usize]) -> Self {
        let mut tick = 0;
        let bars = order
            .iter()
            .filter_map(|&index| {
                let duration = song_bars.get(index)?.duration_ticks() as i64;
                let bar = PlaylistBar::new(index, tick, duration);
                tick += duration;
                Some(bar)
            })
            .collect();
        Self { bars, duration: tick }
    }

    pub fn bars(&self) -> &[PlaylistBar] {
        &self.bars
    }

    pub fn get(&self, index: usize) -> Option<&PlaylistBar> {
        self.bars.get(index)
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn duration_ticks(&self) -> i64 {
        self.duration
    }

    /// Index in the playlist of the first performance of song bar `bar`.
    pub fn first_index_of_bar(&self, bar: usize) -> Option<usize> {
        self.bars.iter().position(|b| b.bar_index == bar)
    }

    pub fn first_occurrence_of_bar(&self, bar: usize) -> Option<&PlaylistBar> {
        self.bars.iter().find(|b| b.bar_index == bar)
    }

    /// Playlist index of the bar playing at `tick`.
    pub fn index_at_tick(&self, tick: f64) -> Option<usize> {
        let after = self.bars.partition_point(|b| b.tick as f64 <= tick);
        let index = after.checked_sub(1)?;
        (tick < self.bars[index].end_tick() as f64).then_some(index)
    }

    /// Extend every performance of song bar `bar`.
    pub fn extend_bar(&mut self, bar: usize, before: i64, after: i64) {
        for playlist_bar in self.bars.iter_mut().filter(|b| b.bar_index == bar) {
            playlist_bar.extend(before, after);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sequencing::TimeSignature;

    fn plain(count: usize) -> Vec<Bar> {
        vec![Bar::new(TimeSignature::FOUR_FOUR); count]
    }

    fn compile(bars: &[Bar]) -> Vec<usize> {
        PlaylistCompiler::new().compile(bars)
    }

    #[test]
    fn no_directions_is_linear() {
        assert_eq!(compile(&plain(5)), vec![0, 1, 2, 3, 4]);
        assert!(compile(&[]).is_empty());
    }

    #[test]
    fn repeat_count_is_honoured() {
        let mut bars = plain(4);
        bars[1] = bars[1].repeat_start();
        bars[2] = bars[2].repeat_end(3);
        assert_eq!(compile(&bars), vec![0, 1, 2, 1, 2, 1, 2, 3]);
    }

    #[test]
    fn repeat_without_start_returns_to_first_bar() {
        let mut bars = plain(3);
        bars[1] = bars[1].repeat_end(0);
        assert_eq!(compile(&bars), vec![0, 1, 0, 1, 2]);
    }

    #[test]
    fn alternate_endings_follow_iteration() {
        let mut bars = plain(5);
        bars[0] = bars[0].repeat_start();
        bars[2] = bars[2].alternate_ending(&[1]).repeat_end(5);
        bars[3] = bars[3].alternate_ending(&[2]);
        assert_eq!(compile(&bars), vec![0, 1, 2, 0, 1, 3, 4]);
    }

    #[test]
    fn da_capo_al_fine_stops_at_fine() {
        let mut bars = plain(4);
        bars[1] = bars[1].target(DirectionTarget::Fine);
        bars[3] = bars[3].jump(DirectionJump::DaCapoAlFine);
        assert_eq!(compile(&bars), vec![0, 1, 2, 3, 0, 1]);
    }

    #[test]
    fn dal_segno_al_coda() {
        let mut bars = plain(6);
        bars[1] = bars[1].target(DirectionTarget::Segno);
        bars[2] = bars[2].jump(DirectionJump::ToCoda);
        bars[3] = bars[3].jump(DirectionJump::DalSegnoAlCoda);
        bars[5] = bars[5].target(DirectionTarget::Coda);
        assert_eq!(compile(&bars), vec![0, 1, 2, 3, 1, 2, 5]);
    }

    #[test]
    fn dal_segno_without_segno_is_skipped() {
        let mut bars = plain(3);
        bars[1] = bars[1].jump(DirectionJump::DalSegno);
        assert_eq!(compile(&bars), vec![0, 1, 2]);
    }

    #[test]
    fn duplicate_directions_warn_and_keep_first() {
        let mut bars = plain(4);
        bars[0] = bars[0].target(DirectionTarget::Segno);
        bars[2] = bars[2].target(DirectionTarget::Segno);
        bars[3] = bars[3].jump(DirectionJump::DalSegno);
        let mut compiler = PlaylistCompiler::new();
        assert_eq!(compiler.compile(&bars), vec![0, 1, 2, 3, 0, 1, 2, 3]);
        assert_eq!(
            compiler.warnings(),
            &[CompileWarning::DuplicateTarget {
                target: DirectionTarget::Segno,
                bar: 2
            }]
        );
    }

    #[test]
    fn playlist_ticks_accumulate() {
        let mut bars = plain(2);
        bars[0] = Bar::new(TimeSignature::THREE_FOUR);
        bars[1] = bars[1].repeat_end(2);
        let playlist = Playlist::from_bars(&bars);
        let ticks: Vec<i64> = playlist.bars().iter().map(|b| b.tick).collect();
        assert_eq!(ticks, vec![0, 1440, 3360, 4800]);
        assert_eq!(playlist.duration_ticks(), 6720);
        assert_eq!(playlist.index_at_tick(3400.0), Some(2));
        assert_eq!(playlist.index_at_tick(6720.0), None);
    }

    #[test]
    fn intersection_prefers_normal_range() {
        let mut playlist = Playlist::from_bars(&plain(3));
        playlist.extend_bar(1, 100, 240);
        let bar = playlist.bars()[1];
        assert_eq!((bar.extended_tick, bar.extended_duration), (1820, 2260));
        assert_eq!(bar.intersects(2000.0, 2100.0), Some(Intersection::Normal));
        assert_eq!(bar.intersects(1830.0, 1900.0), Some(Intersection::Extended));
        assert_eq!(bar.intersects(0.0, 1000.0), None);
    }
}
