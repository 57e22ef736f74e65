use serde::{Deserialize, Serialize};

/// How a channel timestamps its samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimestampArity {
    /// Plain values, no timestamp series is kept.
    None,
    /// One timestamp per sample.
    Point,
    /// A begin/end pair per sample.
    Interval,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PauseKind {
    YoungGc,
    FullGc,
    PromotionFailed,
    InitialMark,
    Remark,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HeapKind {
    HeapBefore,
    HeapAfter,
    HeapCapacity,
    YoungBefore,
    YoungAfter,
    YoungCapacity,
    OldBefore,
    OldAfter,
    OldCapacity,
    PermBefore,
    PermAfter,
    PermCapacity,
}

/// CMS concurrent phases that report `active/elapsed` timings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CmsPhase {
    Mark,
    Preclean,
    AbortablePreclean,
    Sweep,
    Reset,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseClock {
    /// CPU-busy time reported by the collector thread.
    Active,
    /// Wall-clock time of the phase.
    Elapsed,
}

/// Parallel-old compaction sub-phases (`-XX:+PrintParallelOldGCPhaseTimes`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompactionPhase {
    PreCompact,
    MarkingPhase,
    ParMark,
    ReferenceProcessing,
    ClassUnloading,
    SummaryPhase,
    AdjustRoots,
    CompactionPhase,
    DrainTaskSetup,
    DensePrefixTaskSetup,
    StealTaskSetup,
    ParCompact,
    DeferredUpdates,
    PostCompact,
    AdjustPointers,
    MarkingStack,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DerivedKind {
    /// KB promoted into the old generation by one collection.
    Promoted,
    /// KB allocated by the application since the previous collection.
    Allocated,
    /// KB/s allocated between two collections.
    AllocationRate,
    /// KB/s promoted between two collections.
    PromotionRate,
    /// KB per CPU-second of the whole concurrent-collection window.
    MutatorAllocRateElapsedCpu,
    /// KB per CPU-second the mutator actually ran in the window.
    MutatorAllocRateMutatorCpu,
}

/// A fixed statistics channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricTag {
    Pause(PauseKind),
    Heap(HeapKind),
    Concurrent(CmsPhase, PhaseClock),
    Compaction(CompactionPhase),
    Derived(DerivedKind),
}

impl PauseKind {
    pub const ALL: [PauseKind; 5] = [
        PauseKind::YoungGc,
        PauseKind::FullGc,
        PauseKind::PromotionFailed,
        PauseKind::InitialMark,
        PauseKind::Remark,
    ];

    /// Activity kind name used on the trace.
    pub fn activity_name(&self) -> &'static str {
        match self {
            PauseKind::YoungGc => "Young GC",
            PauseKind::FullGc => "Full GC",
            PauseKind::PromotionFailed => "Promotion Failed",
            PauseKind::InitialMark => "Initial Mark",
            PauseKind::Remark => "Remark",
        }
    }

    /// Reverse of [`activity_name`](Self::activity_name).
    pub fn from_activity_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.activity_name() == name)
    }

    fn slug(&self) -> &'static str {
        match self {
            PauseKind::YoungGc => "young_gc",
            PauseKind::FullGc => "full_gc",
            PauseKind::PromotionFailed => "promotion_failed",
            PauseKind::InitialMark => "initial_mark",
            PauseKind::Remark => "remark",
        }
    }
}

impl HeapKind {
    pub const ALL: [HeapKind; 12] = [
        HeapKind::HeapBefore,
        HeapKind::HeapAfter,
        HeapKind::HeapCapacity,
        HeapKind::YoungBefore,
        HeapKind::YoungAfter,
        HeapKind::YoungCapacity,
        HeapKind::OldBefore,
        HeapKind::OldAfter,
        HeapKind::OldCapacity,
        HeapKind::PermBefore,
        HeapKind::PermAfter,
        HeapKind::PermCapacity,
    ];

    fn slug(&self) -> &'static str {
        match self {
            HeapKind::HeapBefore => "heap_before",
            HeapKind::HeapAfter => "heap_after",
            HeapKind::HeapCapacity => "heap_capacity",
            HeapKind::YoungBefore => "young_before",
            HeapKind::YoungAfter => "young_after",
            HeapKind::YoungCapacity => "young_capacity",
            HeapKind::OldBefore => "old_before",
            HeapKind::OldAfter => "old_after",
            HeapKind::OldCapacity => "old_capacity",
            HeapKind::PermBefore => "perm_before",
            HeapKind::PermAfter => "perm_after",
            HeapKind::PermCapacity => "perm_capacity",
        }
    }
}

impl CmsPhase {
    pub const ALL: [CmsPhase; 5] = [
        CmsPhase::Mark,
        CmsPhase::Preclean,
        CmsPhase::AbortablePreclean,
        CmsPhase::Sweep,
        CmsPhase::Reset,
    ];

    /// Phase name as printed after `CMS-concurrent-`.
    pub fn log_name(&self) -> &'static str {
        match self {
            CmsPhase::Mark => "mark",
            CmsPhase::Preclean => "preclean",
            CmsPhase::AbortablePreclean => "abortable-preclean",
            CmsPhase::Sweep => "sweep",
            CmsPhase::Reset => "reset",
        }
    }

    pub fn from_log_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.log_name() == name)
    }

    /// Activity kind name used on the trace.
    pub fn activity_name(&self) -> &'static str {
        match self {
            CmsPhase::Mark => "CMS-concurrent-mark",
            CmsPhase::Preclean => "CMS-concurrent-preclean",
            CmsPhase::AbortablePreclean => "CMS-concurrent-abortable-preclean",
            CmsPhase::Sweep => "CMS-concurrent-sweep",
            CmsPhase::Reset => "CMS-concurrent-reset",
        }
    }
}

impl CompactionPhase {
    pub const ALL: [CompactionPhase; 16] = [
        CompactionPhase::PreCompact,
        CompactionPhase::MarkingPhase,
        CompactionPhase::ParMark,
        CompactionPhase::ReferenceProcessing,
        CompactionPhase::ClassUnloading,
        CompactionPhase::SummaryPhase,
        CompactionPhase::AdjustRoots,
        CompactionPhase::CompactionPhase,
        CompactionPhase::DrainTaskSetup,
        CompactionPhase::DensePrefixTaskSetup,
        CompactionPhase::StealTaskSetup,
        CompactionPhase::ParCompact,
        CompactionPhase::DeferredUpdates,
        CompactionPhase::PostCompact,
        CompactionPhase::AdjustPointers,
        CompactionPhase::MarkingStack,
    ];

    /// Phase name as printed in the log line.
    pub fn log_name(&self) -> &'static str {
        match self {
            CompactionPhase::PreCompact => "pre compact",
            CompactionPhase::MarkingPhase => "marking phase",
            CompactionPhase::ParMark => "par mark",
            CompactionPhase::ReferenceProcessing => "reference processing",
            CompactionPhase::ClassUnloading => "class unloading",
            CompactionPhase::SummaryPhase => "summary phase",
            CompactionPhase::AdjustRoots => "adjust roots",
            CompactionPhase::CompactionPhase => "compaction phase",
            CompactionPhase::DrainTaskSetup => "drain task setup",
            CompactionPhase::DensePrefixTaskSetup => "dense prefix task setup",
            CompactionPhase::StealTaskSetup => "steal task setup",
            CompactionPhase::ParCompact => "par compact",
            CompactionPhase::DeferredUpdates => "deferred updates",
            CompactionPhase::PostCompact => "post compact",
            CompactionPhase::AdjustPointers => "adjust pointers",
            CompactionPhase::MarkingStack => "marking stack",
        }
    }

    /// Activity kind name used on the trace, e.g. `Compaction: par mark`.
    pub fn activity_name(&self) -> String {
        format!("Compaction: {}", self.log_name())
    }
}

impl DerivedKind {
    pub const ALL: [DerivedKind; 6] = [
        DerivedKind::Promoted,
        DerivedKind::Allocated,
        DerivedKind::AllocationRate,
        DerivedKind::PromotionRate,
        DerivedKind::MutatorAllocRateElapsedCpu,
        DerivedKind::MutatorAllocRateMutatorCpu,
    ];

    fn slug(&self) -> &'static str {
        match self {
            DerivedKind::Promoted => "promoted",
            DerivedKind::Allocated => "allocated",
            DerivedKind::AllocationRate => "allocation_rate",
            DerivedKind::PromotionRate => "promotion_rate",
            DerivedKind::MutatorAllocRateElapsedCpu => "mutator_alloc_rate_elapsed_cpu",
            DerivedKind::MutatorAllocRateMutatorCpu => "mutator_alloc_rate_mutator_cpu",
        }
    }
}

impl MetricTag {
    /// Every channel, in a stable order.
    pub fn all() -> Vec<MetricTag> {
        let mut tags = Vec::with_capacity(64);
        tags.extend(PauseKind::ALL.into_iter().map(MetricTag::Pause));
        tags.extend(HeapKind::ALL.into_iter().map(MetricTag::Heap));
        for phase in CmsPhase::ALL {
            tags.push(MetricTag::Concurrent(phase, PhaseClock::Active));
            tags.push(MetricTag::Concurrent(phase, PhaseClock::Elapsed));
        }
        tags.extend(CompactionPhase::ALL.into_iter().map(MetricTag::Compaction));
        tags.extend(DerivedKind::ALL.into_iter().map(MetricTag::Derived));
        tags
    }

    pub fn arity(&self) -> TimestampArity {
        match self {
            MetricTag::Pause(_) | MetricTag::Concurrent(..) | MetricTag::Compaction(_) => {
                TimestampArity::Interval
            }
            MetricTag::Heap(_) => TimestampArity::Point,
            MetricTag::Derived(DerivedKind::Promoted | DerivedKind::Allocated) => {
                TimestampArity::None
            }
            MetricTag::Derived(_) => TimestampArity::Point,
        }
    }

    /// Stable file-name friendly identifier, e.g. `pause.young_gc`.
    pub fn slug(&self) -> String {
        match self {
            MetricTag::Pause(k) => format!("pause.{}", k.slug()),
            MetricTag::Heap(k) => format!("heap.{}", k.slug()),
            MetricTag::Concurrent(phase, clock) => format!(
                "cms.{}.{}",
                phase.log_name().replace('-', "_"),
                match clock {
                    PhaseClock::Active => "active",
                    PhaseClock::Elapsed => "elapsed",
                }
            ),
            MetricTag::Compaction(p) => format!("compaction.{}", p.log_name().replace(' ', "_")),
            MetricTag::Derived(k) => format!("derived.{}", k.slug()),
        }
    }

    /// Unit of the channel's values.
    pub fn unit(&self) -> &'static str {
        match self {
            MetricTag::Pause(_) | MetricTag::Concurrent(..) | MetricTag::Compaction(_) => "s",
            MetricTag::Heap(_) | MetricTag::Derived(DerivedKind::Promoted | DerivedKind::Allocated) => "KB",
            MetricTag::Derived(_) => "KB/s",
        }
    }

    /// Human readable channel name.
    pub fn label(&self) -> String {
        match self {
            MetricTag::Pause(k) => k.activity_name().to_string(),
            MetricTag::Heap(k) => {
                let (space, moment) = match k {
                    HeapKind::HeapBefore => ("Heap", "before GC"),
                    HeapKind::HeapAfter => ("Heap", "after GC"),
                    HeapKind::HeapCapacity => ("Heap", "capacity"),
                    HeapKind::YoungBefore => ("Young generation", "before GC"),
                    HeapKind::YoungAfter => ("Young generation", "after GC"),
                    HeapKind::YoungCapacity => ("Young generation", "capacity"),
                    HeapKind::OldBefore => ("Old generation", "before GC"),
                    HeapKind::OldAfter => ("Old generation", "after GC"),
                    HeapKind::OldCapacity => ("Old generation", "capacity"),
                    HeapKind::PermBefore => ("Perm generation", "before GC"),
                    HeapKind::PermAfter => ("Perm generation", "after GC"),
                    HeapKind::PermCapacity => ("Perm generation", "capacity"),
                };
                format!("{} {}", space, moment)
            }
            MetricTag::Concurrent(phase, clock) => format!(
                "{} ({})",
                phase.activity_name(),
                match clock {
                    PhaseClock::Active => "active",
                    PhaseClock::Elapsed => "elapsed",
                }
            ),
            MetricTag::Compaction(p) => p.activity_name(),
            MetricTag::Derived(k) => match k {
                DerivedKind::Promoted => "Promoted",
                DerivedKind::Allocated => "Allocated",
                DerivedKind::AllocationRate => "Allocation rate",
                DerivedKind::PromotionRate => "Promotion rate",
                DerivedKind::MutatorAllocRateElapsedCpu => "Mutator allocation rate (elapsed CPU)",
                DerivedKind::MutatorAllocRateMutatorCpu => "Mutator allocation rate (mutator CPU)",
            }
            .to_string(),
        }
    }
}

impl std::fmt::Display for MetricTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.slug())
    }
}
