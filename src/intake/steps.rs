//! Step definitions — the questions and the fixed order each variant asks
//! them in.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::i18n::PromptKey;

/// One question of the intake form, bound to one answer field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    Language,
    BrandName,
    BusinessType,
    City,
    Address,
    Phones,
    Socials,
    Services,
    ServiceDuration,
    WorkDays,
    WorkHours,
    SpecialistsCount,
    LogoUrl,
    ColorsEmojis,
    ContactInfo,
    TechContact,
    HostingNeeded,
    ExtraFeatures,
}

impl Step {
    /// Key the answer is stored under.
    pub fn field_name(&self) -> &'static str {
        match self {
            Self::Language => "language",
            Self::BrandName => "brand_name",
            Self::BusinessType => "business_type",
            Self::City => "city",
            Self::Address => "address",
            Self::Phones => "phones",
            Self::Socials => "socials",
            Self::Services => "services",
            Self::ServiceDuration => "service_duration",
            Self::WorkDays => "work_days",
            Self::WorkHours => "work_hours",
            Self::SpecialistsCount => "specialists_count",
            Self::LogoUrl => "logo_url",
            Self::ColorsEmojis => "colors_emojis",
            Self::ContactInfo => "contact_info",
            Self::TechContact => "tech_contact",
            Self::HostingNeeded => "hosting_needed",
            Self::ExtraFeatures => "extra_features",
        }
    }

    pub fn prompt_key(&self) -> PromptKey {
        match self {
            Self::Language => PromptKey::ChooseLanguage,
            Self::BrandName => PromptKey::BrandName,
            Self::BusinessType => PromptKey::BusinessType,
            Self::City => PromptKey::City,
            Self::Address => PromptKey::Address,
            Self::Phones => PromptKey::Phones,
            Self::Socials => PromptKey::Socials,
            Self::Services => PromptKey::Services,
            Self::ServiceDuration => PromptKey::ServiceDuration,
            Self::WorkDays => PromptKey::WorkDays,
            Self::WorkHours => PromptKey::WorkHours,
            Self::SpecialistsCount => PromptKey::SpecialistsCount,
            Self::LogoUrl => PromptKey::LogoUrl,
            Self::ColorsEmojis => PromptKey::ColorsEmojis,
            Self::ContactInfo => PromptKey::ContactInfo,
            Self::TechContact => PromptKey::TechContact,
            Self::HostingNeeded => PromptKey::HostingNeeded,
            Self::ExtraFeatures => PromptKey::ExtraFeatures,
        }
    }
}

impl std::fmt::Display for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.field_name())
    }
}

/// The two outcomes offered on the hosting step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostingChoice {
    Yes,
    No,
}

impl HostingChoice {
    pub const ALL: [HostingChoice; 2] = [HostingChoice::Yes, HostingChoice::No];

    pub fn callback_data(&self) -> &'static str {
        match self {
            Self::Yes => "hosting_yes",
            Self::No => "hosting_no",
        }
    }

    pub fn from_callback(data: &str) -> Option<HostingChoice> {
        match data {
            "hosting_yes" => Some(Self::Yes),
            "hosting_no" => Some(Self::No),
            _ => None,
        }
    }

    /// Key of the fixed label stored as the answer.
    pub fn label_key(&self) -> PromptKey {
        match self {
            Self::Yes => PromptKey::HostingYes,
            Self::No => PromptKey::HostingNo,
        }
    }
}

const CLASSIC_STEPS: &[Step] = &[
    Step::BrandName,
    Step::BusinessType,
    Step::City,
    Step::Services,
    Step::ServiceDuration,
    Step::WorkDays,
    Step::WorkHours,
    Step::SpecialistsCount,
    Step::LogoUrl,
    Step::ColorsEmojis,
    Step::ContactInfo,
    Step::TechContact,
    Step::HostingNeeded,
    Step::ExtraFeatures,
];

const EXTENDED_STEPS: &[Step] = &[
    Step::BrandName,
    Step::BusinessType,
    Step::City,
    Step::Address,
    Step::Phones,
    Step::Socials,
    Step::Services,
    Step::ServiceDuration,
    Step::WorkDays,
    Step::WorkHours,
    Step::SpecialistsCount,
    Step::LogoUrl,
    Step::ColorsEmojis,
    Step::TechContact,
    Step::HostingNeeded,
    Step::ExtraFeatures,
];

const MULTILINGUAL_STEPS: &[Step] = &[
    Step::Language,
    Step::BrandName,
    Step::BusinessType,
    Step::City,
    Step::Address,
    Step::Phones,
    Step::Socials,
    Step::Services,
    Step::ServiceDuration,
    Step::WorkDays,
    Step::WorkHours,
    Step::SpecialistsCount,
    Step::LogoUrl,
    Step::ColorsEmojis,
    Step::TechContact,
    Step::HostingNeeded,
    Step::ExtraFeatures,
];

/// Which form the bot runs. Variants differ only in their step table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Variant {
    /// Single contact field, no language choice.
    #[default]
    Classic,
    /// Address, phones and socials asked separately.
    Extended,
    /// `Extended` preceded by a language choice.
    Multilingual,
}

impl Variant {
    /// The fixed, total step order.
    pub fn steps(&self) -> &'static [Step] {
        match self {
            Self::Classic => CLASSIC_STEPS,
            Self::Extended => EXTENDED_STEPS,
            Self::Multilingual => MULTILINGUAL_STEPS,
        }
    }

    pub fn first_step(&self) -> Step {
        self.steps()[0]
    }

    /// The step following `current`, or `None` once the form is done.
    /// Steps outside this variant have no successor.
    pub fn next_step(&self, current: Step) -> Option<Step> {
        let steps = self.steps();
        let index = steps.iter().position(|s| *s == current)?;
        steps.get(index + 1).copied()
    }

    /// Field names in row order.
    pub fn field_names(&self) -> impl Iterator<Item = &'static str> {
        self.steps().iter().map(Step::field_name)
    }

    pub fn offers_language_choice(&self) -> bool {
        self.steps().contains(&Step::Language)
    }
}

impl std::fmt::Display for Variant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Classic => "classic",
            Self::Extended => "extended",
            Self::Multilingual => "multilingual",
        };
        write!(f, "{s}")
    }
}

impl FromStr for Variant {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "classic" => Ok(Self::Classic),
            "extended" => Ok(Self::Extended),
            "multilingual" => Ok(Self::Multilingual),
            other => Err(format!(
                "unknown variant '{other}' (expected classic, extended or multilingual)"
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VARIANTS: [Variant; 3] = [Variant::Classic, Variant::Extended, Variant::Multilingual];

    #[test]
    fn next_step_walks_every_variant() {
        for variant in VARIANTS {
            let mut current = variant.first_step();
            let mut visited = vec![current];
            while let Some(next) = variant.next_step(current) {
                visited.push(next);
                current = next;
            }
            assert_eq!(visited, variant.steps(), "{variant} order mismatch");
        }
    }

    #[test]
    fn every_variant_ends_with_hosting_then_extras() {
        for variant in VARIANTS {
            let steps = variant.steps();
            assert_eq!(steps[steps.len() - 2], Step::HostingNeeded);
            assert_eq!(steps[steps.len() - 1], Step::ExtraFeatures);
            assert_eq!(variant.next_step(Step::ExtraFeatures), None);
        }
    }

    #[test]
    fn language_step_only_in_multilingual_and_first() {
        assert!(!Variant::Classic.offers_language_choice());
        assert!(!Variant::Extended.offers_language_choice());
        assert!(Variant::Multilingual.offers_language_choice());
        assert_eq!(Variant::Multilingual.first_step(), Step::Language);
        assert_eq!(
            Variant::Multilingual.next_step(Step::Language),
            Some(Step::BrandName)
        );
    }

    #[test]
    fn extended_splits_contact_info() {
        let fields: Vec<_> = Variant::Extended.field_names().collect();
        assert!(fields.contains(&"address"));
        assert!(fields.contains(&"phones"));
        assert!(fields.contains(&"socials"));
        assert!(!fields.contains(&"contact_info"));

        let classic: Vec<_> = Variant::Classic.field_names().collect();
        assert!(classic.contains(&"contact_info"));
        assert!(!classic.contains(&"address"));
    }

    #[test]
    fn step_outside_variant_has_no_successor() {
        assert_eq!(Variant::Classic.next_step(Step::Address), None);
        assert_eq!(Variant::Extended.next_step(Step::Language), None);
    }

    #[test]
    fn field_names_are_unique_per_variant() {
        for variant in VARIANTS {
            let mut fields: Vec<_> = variant.field_names().collect();
            let total = fields.len();
            fields.sort_unstable();
            fields.dedup();
            assert_eq!(fields.len(), total, "{variant} repeats a field");
        }
    }

    #[test]
    fn hosting_choice_callbacks() {
        for choice in HostingChoice::ALL {
            assert_eq!(HostingChoice::from_callback(choice.callback_data()), Some(choice));
        }
        assert_eq!(HostingChoice::from_callback("hosting_maybe"), None);
    }

    #[test]
    fn variant_parse_and_display() {
        for variant in VARIANTS {
            assert_eq!(variant.to_string().parse::<Variant>(), Ok(variant));
        }
        assert_eq!(" Extended ".parse::<Variant>(), Ok(Variant::Extended));
        assert!("v4".parse::<Variant>().is_err());
    }

    #[test]
    fn step_display_matches_serde() {
        for step in Variant::Multilingual.steps().iter().chain(&[Step::ContactInfo]) {
            let json = serde_json::to_string(step).unwrap();
            assert_eq!(format!("\"{step}\""), json);
        }
    }
}
