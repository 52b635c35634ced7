/// Per-profile emphasis rules consumed by the structural rewrite: which
/// skills move to the front, how product names are reframed for non-technical
/// recruiters, and the role context fed to the prompts.
#[derive(Debug, Clone, Copy)]
pub struct ProfileReframe {
    pub skills_emphasis: &'static [&'static str],
    pub title_map: &'static [(&'static str, &'static str)],
    pub role_context: &'static str,
}

pub fn reframe_for(profile: &str) -> Option<&'static ProfileReframe> {
    match profile {
        "cashier" => Some(&CASHIER),
        "stocker" => Some(&STOCKER),
        "logistics" => Some(&LOGISTICS),
        "frontend_dev" => Some(&FRONTEND_DEV),
        "fullstack_dev" => Some(&FULLSTACK_DEV),
        _ => None,
    }
}

static CASHIER: ProfileReframe = ProfileReframe {
    skills_emphasis: &[
        "customer service",
        "POS systems",
        "cash handling",
        "team coordination",
    ],
    title_map: &[
        ("Flowence", "retail customer service platform"),
        ("software", "business application"),
    ],
    role_context: "cajero/dependiente en comercio minorista",
};

static STOCKER: ProfileReframe = ProfileReframe {
    skills_emphasis: &[
        "inventory management",
        "stock control",
        "warehouse operations",
        "team coordination",
    ],
    title_map: &[
        ("Flowence", "sistema de gestión de inventario"),
        ("software", "herramienta de seguimiento"),
    ],
    role_context: "reponedor/mozo de almacén",
};

static LOGISTICS: ProfileReframe = ProfileReframe {
    skills_emphasis: &[
        "logistics coordination",
        "inventory tracking",
        "organizational skills",
        "process optimization",
    ],
    title_map: &[("Flowence", "plataforma de gestión operativa")],
    role_context: "mozo de almacén/operario logístico",
};

static FRONTEND_DEV: ProfileReframe = ProfileReframe {
    skills_emphasis: &[
        "React",
        "Next.js",
        "TypeScript",
        "UI/UX",
        "responsive design",
        "REST APIs",
    ],
    title_map: &[],
    role_context: "desarrollador frontend React/Next.js",
};

static FULLSTACK_DEV: ProfileReframe = ProfileReframe {
    skills_emphasis: &[
        "React",
        "Node.js",
        "PostgreSQL",
        "TypeScript",
        "REST APIs",
        "Stripe",
        "JWT",
    ],
    title_map: &[],
    role_context: "desarrollador fullstack React/Node.js",
};
