//! A+ module types
//!
//! A module is one content block of an A+ page. Each selected module is
//! generated, tracked and stored independently within a session.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModuleType {
    Identity,
    Sensory,
    Extension,
    Trust,
    ProductOverview,
    ProblemSolution,
    FeatureAnalysis,
    SpecificationComparison,
    UsageScenarios,
    InstallationGuide,
    SizeCompatibility,
    MaintenanceCare,
    MaterialCraftsmanship,
    QualityAssurance,
    CustomerReviews,
    PackageContents,
}

impl ModuleType {
    pub const ALL: [ModuleType; 16] = [
        ModuleType::Identity,
        ModuleType::Sensory,
        ModuleType::Extension,
        ModuleType::Trust,
        ModuleType::ProductOverview,
        ModuleType::ProblemSolution,
        ModuleType::FeatureAnalysis,
        ModuleType::SpecificationComparison,
        ModuleType::UsageScenarios,
        ModuleType::InstallationGuide,
        ModuleType::SizeCompatibility,
        ModuleType::MaintenanceCare,
        ModuleType::MaterialCraftsmanship,
        ModuleType::QualityAssurance,
        ModuleType::CustomerReviews,
        ModuleType::PackageContents,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ModuleType::Identity => "identity",
            ModuleType::Sensory => "sensory",
            ModuleType::Extension => "extension",
            ModuleType::Trust => "trust",
            ModuleType::ProductOverview => "product_overview",
            ModuleType::ProblemSolution => "problem_solution",
            ModuleType::FeatureAnalysis => "feature_analysis",
            ModuleType::SpecificationComparison => "specification_comparison",
            ModuleType::UsageScenarios => "usage_scenarios",
            ModuleType::InstallationGuide => "installation_guide",
            ModuleType::SizeCompatibility => "size_compatibility",
            ModuleType::MaintenanceCare => "maintenance_care",
            ModuleType::MaterialCraftsmanship => "material_craftsmanship",
            ModuleType::QualityAssurance => "quality_assurance",
            ModuleType::CustomerReviews => "customer_reviews",
            ModuleType::PackageContents => "package_contents",
        }
    }
}

impl std::fmt::Display for ModuleType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ModuleType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let token = s.trim().to_lowercase();
        ModuleType::ALL
            .iter()
            .copied()
            .find(|m| m.as_str() == token)
            .ok_or_else(|| format!("Unknown module type: {}", s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokens_parse_back() {
        for module in ModuleType::ALL {
            assert_eq!(module.as_str().parse::<ModuleType>(), Ok(module));
        }
        assert_eq!("IDENTITY".parse::<ModuleType>(), Ok(ModuleType::Identity));
        assert!("hologram".parse::<ModuleType>().is_err());
    }

    #[test]
    fn test_serde_uses_tokens() {
        let json = serde_json::to_string(&ModuleType::ProductOverview).unwrap();
        assert_eq!(json, "\"product_overview\"");
    }
}
