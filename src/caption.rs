//! Caption building for posts.
//!
//! Every post caption starts from a base caption written by the captioning
//! stage: `captions/<style>_captions.txt` holds one caption per line, line
//! `i` belonging to image sequence `i + 1` of that style. The base is then
//! dressed for the platform by a [`CaptionProfile`]:
//!
//! ```text
//! <base caption>
//!
//! <tagline>
//! <tagline>
//!
//! [extra blocks, e.g. the Patreon supporter pitch]
//!
//! #hashtag #hashtag ...
//! ```
//!
//! Caption lookup never fails; any problem yields [`FALLBACK_CAPTION`].

use crate::naming::sequence_number;
use crate::types::{ImageRecord, Platform};
use rand::Rng;
use rand::seq::IndexedRandom;
use std::fs;
use std::path::Path;
use tracing::{debug, info, warn};

/// Used whenever no caption can be found for an image.
pub const FALLBACK_CAPTION: &str = "Architecture speaks through silent spaces";

const TRUNCATION_MARKER: &str = "...";

/// Look up the base caption for `record` in `captions_dir`.
pub fn load_base_caption(captions_dir: &Path, record: &ImageRecord) -> String {
    if !captions_dir.is_dir() {
        warn!(dir = %captions_dir.display(), "captions directory not found");
        return FALLBACK_CAPTION.to_string();
    }

    let file = captions_dir.join(format!("{}_captions.txt", record.style));
    let content = match fs::read_to_string(&file) {
        Ok(c) => c,
        Err(e) => {
            warn!(file = %file.display(), error = %e, "caption file not readable");
            return FALLBACK_CAPTION.to_string();
        }
    };

    let Some(seq) = sequence_number(&record.filename).filter(|&n| n >= 1) else {
        warn!(file = %record.filename, "no sequence number in filename, using fallback caption");
        return FALLBACK_CAPTION.to_string();
    };

    match content.lines().nth((seq - 1) as usize).map(str::trim) {
        Some(line) if !line.is_empty() => {
            debug!(file = %record.filename, "loaded caption");
            line.to_string()
        }
        Some(_) => {
            info!(file = %record.filename, "blank caption line, using fallback caption");
            FALLBACK_CAPTION.to_string()
        }
        None => {
            info!(file = %record.filename, seq, "no caption for sequence, using fallback caption");
            FALLBACK_CAPTION.to_string()
        }
    }
}

/// How captions are dressed for one platform.
#[derive(Debug, Clone, Copy)]
pub struct CaptionProfile {
    pub taglines: &'static [&'static str],
    /// Paragraphs placed between the taglines and the hashtags.
    pub extra_blocks: &'static [&'static [&'static str]],
    pub hashtags: &'static [&'static str],
    /// Pick this many hashtags at random instead of using them all.
    pub hashtag_sample: Option<usize>,
    /// Hard length limit in characters.
    pub max_chars: Option<usize>,
}

const INSTAGRAM_HASHTAGS: &[&str] = &[
    "#architecture",
    "#design",
    "#architecturalphotography",
    "#modernarchitecture",
    "#architecturedesign",
    "#architectural",
    "#buildingdesign",
    "#architecturalart",
    "#architecturalstyle",
    "#architecturalphotography",
    "#architecturaldrawing",
    "#architecturalconcept",
    "#architecturalvision",
    "#architecturalinspiration",
];

const PATREON_HASHTAGS: &[&str] = &[
    "#architecture",
    "#design",
    "#architecturalart",
    "#modernarchitecture",
    "#architecturedesign",
    "#architectural",
    "#buildingdesign",
    "#architecturalart",
    "#architecturalstyle",
    "#architecturalphotography",
    "#architecturaldrawing",
    "#architecturalconcept",
    "#architecturalvision",
    "#architecturalinspiration",
];

const ARCHITECTURE_TAGLINES: &[&str] = &[
    "🏗️ Exploring the intersection of form, function, and artistic vision.",
    "📐 Where mathematics meets creativity in built environments.",
];

const INSTAGRAM: CaptionProfile = CaptionProfile {
    taglines: ARCHITECTURE_TAGLINES,
    extra_blocks: &[],
    hashtags: INSTAGRAM_HASHTAGS,
    hashtag_sample: None,
    max_chars: None,
};

const TWITTER: CaptionProfile = CaptionProfile {
    taglines: &[
        "🎨 AI-generated artwork exploring tech frontiers",
        "🔬 From our daily research collection",
        "📱 Follow for daily tech art inspiration",
    ],
    extra_blocks: &[],
    hashtags: &[
        "#AIArt",
        "#Technology",
        "#Science",
        "#Innovation",
        "#DigitalArt",
        "#AI",
        "#MachineLearning",
        "#TechArt",
        "#FutureTech",
    ],
    hashtag_sample: Some(8),
    max_chars: Some(280),
};

const LINKEDIN: CaptionProfile = CaptionProfile {
    taglines: &[
        "🎨 Exploring the intersection of artificial intelligence and creative expression",
        "🔬 Daily insights from our research-driven approach to AI-generated art",
        "💼 How AI is reshaping creative industries and professional workflows",
        "📈 Join the conversation on the future of technology and creativity",
    ],
    extra_blocks: &[],
    hashtags: &[
        "#ArtificialIntelligence",
        "#Technology",
        "#Innovation",
        "#DigitalTransformation",
        "#AI",
        "#MachineLearning",
        "#TechInnovation",
        "#FutureOfWork",
        "#DigitalArt",
        "#CreativeTechnology",
        "#TechLeadership",
        "#InnovationManagement",
    ],
    hashtag_sample: Some(10),
    max_chars: None,
};

const PATREON: CaptionProfile = CaptionProfile {
    taglines: ARCHITECTURE_TAGLINES,
    extra_blocks: &[
        &[
            "🎨 Support this project to get access to:",
            "• Weekly PDF collections (7 images)",
            "• Monthly PDF collections (31 images)",
            "• Yearly PDF collections (366 images)",
            "• Behind-the-scenes content",
        ],
        &["Join our community of architecture enthusiasts! 🏛️"],
    ],
    hashtags: PATREON_HASHTAGS,
    hashtag_sample: None,
    max_chars: None,
};

impl CaptionProfile {
    pub fn for_platform(platform: Platform) -> &'static CaptionProfile {
        match platform {
            Platform::Instagram => &INSTAGRAM,
            Platform::Twitter => &TWITTER,
            Platform::Linkedin => &LINKEDIN,
            Platform::Patreon => &PATREON,
        }
    }

    /// Build the full caption around `base`.
    pub fn format<R: Rng + ?Sized>(&self, base: &str, rng: &mut R) -> String {
        let mut blocks: Vec<String> = vec![base.to_string()];
        if !self.taglines.is_empty() {
            blocks.push(self.taglines.join("\n"));
        }
        for block in self.extra_blocks {
            blocks.push(block.join("\n"));
        }

        let tags: Vec<&str> = match self.hashtag_sample {
            Some(n) => self
                .hashtags
                .choose_multiple(rng, n.min(self.hashtags.len()))
                .copied()
                .collect(),
            None => self.hashtags.to_vec(),
        };
        if !tags.is_empty() {
            blocks.push(tags.join(" "));
        }

        let caption = blocks.join("\n\n");
        match self.max_chars {
            Some(limit) => truncate_chars(&caption, limit),
            None => caption,
        }
    }
}

/// Cut `text` to at most `limit` characters, ending in `...` when cut.
fn truncate_chars(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        return text.to_string();
    }
    let keep = limit.saturating_sub(TRUNCATION_MARKER.len());
    let mut out: String = text.chars().take(keep).collect();
    out.push_str(TRUNCATION_MARKER);
    out
}
