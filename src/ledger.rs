/*!
InterruptLedger: timestamped bookkeeping for the PPU's NMI output.

Purpose
- Keep the readable vblank flag (bit 7 of $2002) and the CPU-visible NMI edge
  apart. The flag is cleared by status reads and by the pre-render line; the
  edge latch is cleared only when the CPU acknowledges it at the end of its
  interrupt service sequence.
- Resolve the $2002 race: a status read landing on the same tick the vblank
  span begins suppresses that frame's NMI, while the flag still reads as set.

Events
- `record_assert_set` / `record_assert_clear`: vblank span boundaries.
- `record_enable_toggle`: PPUCTRL bit 7 transitions. Turning NMI on while the
  flag is still visible latches a fresh edge.
- `record_status_read`: $2002 reads.
- `acknowledge`: CPU consumed the edge.

The ledger owns no hardware register. Every answer is derived from the
timestamps and the two booleans below.
*/

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InterruptLedger {
    last_set: Option<u64>,
    last_clear: Option<u64>,
    last_status_read: Option<u64>,
    last_toggle: Option<u64>,
    last_ack: Option<u64>,

    span_active: bool,
    edge_latched: bool,

    // Tick the currently latched edge was raised on.
    edge_tick: Option<u64>,
    // Set tick whose edge was cancelled by a same-tick status read.
    suppressed_set: Option<u64>,
}

impl InterruptLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Vblank began at `tick`. Latches an edge on the inactive to active
    /// transition when NMI output is enabled.
    pub fn record_assert_set(&mut self, tick: u64, enabled: bool) {
        let was_active = self.span_active;
        self.last_set = Some(tick);
        self.span_active = true;
        if !was_active && enabled {
            self.latch_edge(tick);
        }
    }

    /// Vblank ended at `tick`. A latched edge stays latched.
    pub fn record_assert_clear(&mut self, tick: u64) {
        self.last_clear = Some(tick);
        self.span_active = false;
    }

    /// PPUCTRL bit 7 was written at `tick` with `old` -> `new`.
    pub fn record_enable_toggle(&mut self, tick: u64, old: bool, new: bool) {
        if old == new {
            return;
        }
        self.last_toggle = Some(tick);
        if !old && new && self.flag_visible() {
            self.latch_edge(tick);
        }
    }

    /// $2002 was read at `tick`.
    pub fn record_status_read(&mut self, tick: u64) {
        self.last_status_read = Some(tick);
        if self.span_active && self.last_set == Some(tick) {
            self.suppressed_set = Some(tick);
        }
    }

    /// Whether the CPU's NMI input is asserted at `tick`.
    pub fn should_assert_line(&self, tick: u64, enabled: bool) -> bool {
        let Some(edge) = self.edge_tick else {
            return false;
        };
        self.edge_latched && enabled && edge <= tick && self.suppressed_set != Some(edge)
    }

    /// The CPU finished servicing the NMI.
    pub fn acknowledge(&mut self, tick: u64) {
        self.last_ack = Some(tick);
        self.edge_latched = false;
        self.edge_tick = None;
    }

    /// Value of the readable vblank flag: inside the span and not yet read.
    pub fn flag_visible(&self) -> bool {
        if !self.span_active {
            return false;
        }
        match (self.last_set, self.last_status_read) {
            (Some(set), Some(read)) => read < set,
            _ => true,
        }
    }

    #[inline]
    pub fn span_active(&self) -> bool {
        self.span_active
    }

    #[inline]
    pub fn edge_latched(&self) -> bool {
        self.edge_latched
    }

    #[inline]
    pub fn last_acknowledge(&self) -> Option<u64> {
        self.last_ack
    }

    #[inline]
    pub fn last_clear(&self) -> Option<u64> {
        self.last_clear
    }

    #[inline]
    pub fn last_toggle(&self) -> Option<u64> {
        self.last_toggle
    }

    fn latch_edge(&mut self, tick: u64) {
        self.edge_latched = true;
        self.edge_tick = Some(tick);
    }
}
