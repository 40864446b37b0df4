//! Skill taxonomy: the static category → keyword table used for detection.
//!
//! Category order is significant: recommendation and report sections iterate
//! categories in declaration order so output stays deterministic.

/// Sentinel category for skills that are not in the taxonomy.
pub const OTHER_CATEGORY: &str = "other";

/// One taxonomy category. Keywords are lowercase and unique across the table.
#[derive(Debug)]
pub struct SkillCategory {
    pub key: &'static str,
    pub label: &'static str,
    pub skills: &'static [&'static str],
    /// Improvement suggestion for missing skills in this category. `{skills}` is replaced.
    pub improvement_template: Option<&'static str>,
}

#[derive(Debug)]
pub struct SkillTaxonomy {
    categories: &'static [SkillCategory],
}

pub static DEFAULT_TAXONOMY: SkillTaxonomy = SkillTaxonomy {
    categories: &[
        SkillCategory {
            key: "programming",
            label: "Programming",
            skills: &[
                "javascript",
                "typescript",
                "python",
                "java",
                "c++",
                "ruby",
                "php",
                "scala",
                "kotlin",
                "swift",
                "rust",
                "go",
            ],
            improvement_template: Some(
                "Add projects or work experience that show hands-on use of {skills}",
            ),
        },
        SkillCategory {
            key: "frontend",
            label: "Frontend",
            skills: &[
                "react",
                "vue",
                "angular",
                "html",
                "css",
                "sass",
                "less",
                "tailwind",
                "bootstrap",
                "material-ui",
                "webpack",
                "vite",
                "nextjs",
                "gatsby",
            ],
            improvement_template: Some(
                "Showcase user-facing work built with {skills}, ideally with a portfolio link",
            ),
        },
        SkillCategory {
            key: "backend",
            label: "Backend",
            skills: &[
                "node",
                "express",
                "django",
                "flask",
                "spring",
                "rails",
                "laravel",
                "asp.net",
                "fastapi",
                "graphql",
                "rest",
            ],
            improvement_template: Some(
                "Describe services or APIs you have designed using {skills}",
            ),
        },
        SkillCategory {
            key: "database",
            label: "Database",
            skills: &[
                "sql",
                "mysql",
                "postgresql",
                "mongodb",
                "redis",
                "elasticsearch",
                "dynamodb",
                "cassandra",
                "oracle",
                "sqlite",
            ],
            improvement_template: Some(
                "Mention data modelling or query optimisation work involving {skills}",
            ),
        },
        SkillCategory {
            key: "cloud",
            label: "Cloud & DevOps",
            skills: &[
                "aws",
                "azure",
                "gcp",
                "cloud",
                "docker",
                "kubernetes",
                "serverless",
                "terraform",
                "jenkins",
                "ci/cd",
                "devops",
            ],
            improvement_template: Some(
                "Highlight deployments, infrastructure or pipelines you have run on {skills}",
            ),
        },
        SkillCategory {
            key: "testing",
            label: "Testing",
            skills: &[
                "jest",
                "mocha",
                "cypress",
                "selenium",
                "testing",
                "tdd",
                "unit test",
                "integration test",
                "e2e test",
            ],
            improvement_template: Some(
                "Call out your testing practice, including coverage or quality results with {skills}",
            ),
        },
        SkillCategory {
            key: "soft_skills",
            label: "Soft Skills",
            skills: &[
                "leadership",
                "communication",
                "teamwork",
                "problem-solving",
                "analytical",
                "project management",
                "agile",
                "scrum",
            ],
            improvement_template: Some(
                "Give concrete examples that demonstrate {skills}",
            ),
        },
    ],
};

impl SkillTaxonomy {
    pub fn categories(&self) -> &'static [SkillCategory] {
        self.categories
    }

    /// All keywords flattened in category order.
    pub fn all_skills(&self) -> Vec<&'static str> {
        self.categories
            .iter()
            .flat_map(|c| c.skills.iter().copied())
            .collect()
    }

    /// Returns the key of the first category containing `skill` (case-insensitive),
    /// or [`OTHER_CATEGORY`].
    pub fn category_of(&self, skill: &str) -> &'static str {
        let skill = skill.to_lowercase();
        self.categories
            .iter()
            .find(|c| c.skills.contains(&skill.as_str()))
            .map(|c| c.key)
            .unwrap_or(OTHER_CATEGORY)
    }

    pub fn category(&self, key: &str) -> Option<&'static SkillCategory> {
        self.categories.iter().find(|c| c.key == key)
    }
}
