//! The fixed 21-field content schema: 16 generated fields (in response order)
//! and 5 constant fields, each with the page location it feeds.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    /// Section label the generator emits, e.g. `INSIGHT`.
    pub label: &'static str,
    /// JSON key in the published artifact.
    pub key: &'static str,
    pub location: &'static str,
    /// Served when a run falls back.
    pub fallback: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StaticField {
    pub key: &'static str,
    pub location: &'static str,
    pub value: &'static str,
}

pub const DYNAMIC_FIELD_COUNT: usize = 16;
pub const STATIC_FIELD_COUNT: usize = 5;
pub const TOTAL_FIELD_COUNT: usize = DYNAMIC_FIELD_COUNT + STATIC_FIELD_COUNT;

pub const DYNAMIC_FIELDS: [FieldSpec; DYNAMIC_FIELD_COUNT] = [
    FieldSpec {
        label: "INSIGHT",
        key: "newsInsight",
        location: "Manifesto page, opening paragraph under the main heading",
        fallback: "Notice how every CEO says they want innovation but hires for predictability? That's not contradiction. That's institutional self-preservation disguised as strategy.",
    },
    FieldSpec {
        label: "QUESTION",
        key: "intelligenceExample",
        location: "What We Do page, continuation after the wrong-problem sentence",
        fallback: "Unemployment hitting 5%, for example. We read that and our mind goes to: what industries are hardest hit, and what does that tell us about which skills are becoming obsolete?",
    },
    FieldSpec {
        label: "CONSULTING",
        key: "consultingInsight",
        location: "Consulting page, lead insight",
        fallback: "We were just reading about how the big consulting firms built something remarkable. World class thinking, rigorous frameworks, proven methodologies. But what if that caliber of strategic insight wasn't locked behind day rates?",
    },
    FieldSpec {
        label: "REMINDER",
        key: "contentReminder",
        location: "Returning-reader reminder banner",
        fallback: "Remember how the landing page showed CEOs hiring for predictability, and the What We Do page wondered which skills are becoming obsolete?",
    },
    FieldSpec {
        label: "OBSERVATION",
        key: "marketObservation",
        location: "Inline observation block",
        fallback: "Right now we're watching companies panic about efficiency while missing the real pattern: their best people are solving the wrong problems brilliantly.",
    },
    FieldSpec {
        label: "PURPOSE",
        key: "purposeContext",
        location: "Purpose section, context line",
        fallback: "The companies surviving best are the ones whose teams already knew the answer to 'why do we exist beyond making money?'",
    },
    FieldSpec {
        label: "SERVICE",
        key: "serviceDescription",
        location: "Purpose service card",
        fallback: "Dissect your business from its root reason to exist. Then cascade that purpose through every system and touchpoint. Purpose as operating system, not marketing tagline.",
    },
    FieldSpec {
        label: "ESI",
        key: "esiDescription",
        location: "ESI framework card",
        fallback: "Explore, Synthesize, Ignite. Our operating system for transformation. Explore uncovers truth. Synthesize turns discovery into clarity. Ignite makes clarity executable.",
    },
    FieldSpec {
        label: "AGENCY",
        key: "agencyDescription",
        location: "Secret Agency card",
        fallback: "For high-performers who realize their 70-hour weeks produce 40 hours of value. Secret Agency: where executives learn to optimize for impact, not inbox zero.",
    },
    FieldSpec {
        label: "KSO",
        key: "ksoDescription",
        location: "KSO workshop card",
        fallback: "The future of discoverability isn't about links. It's about ideas. We dissect your business DNA and rebuild it as a knowledge graph of authority.",
    },
    FieldSpec {
        label: "TRANSACTION",
        key: "transactionDescription",
        location: "Transaction Architecture card",
        fallback: "Vision to transaction to validation. Map how value exchanges actually happen across emotional resonance, cognitive understanding, and measurable action. Conversion through understanding, not manipulation.",
    },
    FieldSpec {
        label: "TRIPTYCH",
        key: "triptychDescription",
        location: "Strategic Triptych card",
        fallback: "We examine your business through three lenses simultaneously: how you market, how you compete, how you build. Most problems live in the gaps between these. Most opportunities too.",
    },
    FieldSpec {
        label: "DEMAND",
        key: "demandInsight",
        location: "Demand page, lead paragraph",
        fallback: "Demand sends signals. Constantly. Clearly. Most companies just aren't listening.",
    },
    FieldSpec {
        label: "INCENTIVES",
        key: "incentivesInsight",
        location: "Incentives page, lead paragraph",
        fallback: "Water always finds its way. So do incentives. Map how people actually behave, not how the org chart says they should.",
    },
    FieldSpec {
        label: "AGENTIC",
        key: "agenticInsight",
        location: "Agentic page, lead paragraph",
        fallback: "Technology is moving from tools that wait for commands to systems that act with purpose. The question is whose judgment they multiply.",
    },
    FieldSpec {
        label: "PRISMATIC",
        key: "prismaticInsight",
        location: "Prismatic page, lead paragraph",
        fallback: "The most valuable insights often come from outside your industry. Tokyo's railway planners learned from slime mold.",
    },
];

pub const STATIC_FIELDS: [StaticField; STATIC_FIELD_COUNT] = [
    StaticField {
        key: "patternInsight",
        location: "Manifesto page, reader acknowledgement line",
        value: "You're still reading. That already puts you ahead.",
    },
    StaticField {
        key: "manifestoHeading",
        location: "Manifesto page, main heading",
        value: "FINALLY. THINKING AS A SERVICE. NO PERFORMANCE. JUST PERFORMANCE.",
    },
    StaticField {
        key: "manifestoFollowUp",
        location: "Manifesto page, paragraph after the news insight",
        value: "Are you optimizing the right variable?",
    },
    StaticField {
        key: "wrongProblemLead",
        location: "What We Do page, sentence before the intelligence example",
        value: "But if you're solving the wrong problem, execution excellence just gets you to the wrong destination faster.",
    },
    StaticField {
        key: "demandPrinciple",
        location: "Demand page, principle statement",
        value: "Growth is demand driven. Not supply driven. Not product driven. Not business driven. Demand driven.",
    },
];

/// Labels in the order the generator must emit them.
pub fn dynamic_labels() -> Vec<String> {
    DYNAMIC_FIELDS.iter().map(|f| f.label.to_string()).collect()
}

pub fn spec_for_label(label: &str) -> Option<&'static FieldSpec> {
    DYNAMIC_FIELDS.iter().find(|f| f.label == label)
}

/// Location annotation for any of the 21 keys.
pub fn location_for_key(key: &str) -> Option<&'static str> {
    DYNAMIC_FIELDS
        .iter()
        .find(|f| f.key == key)
        .map(|f| f.location)
        .or_else(|| STATIC_FIELDS.iter().find(|f| f.key == key).map(|f| f.location))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn keys_and_labels_are_unique_and_non_empty() {
        let mut keys = HashSet::new();
        let mut labels = HashSet::new();
        for f in DYNAMIC_FIELDS {
            assert!(labels.insert(f.label));
            assert!(keys.insert(f.key));
            assert!(!f.fallback.trim().is_empty());
        }
        for s in STATIC_FIELDS {
            assert!(keys.insert(s.key));
            assert!(!s.value.trim().is_empty());
        }
        assert_eq!(keys.len(), TOTAL_FIELD_COUNT);
    }
}
