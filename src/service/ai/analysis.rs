use rand::Rng;
use serde::Serialize;
use serde_json::{Map, Value};

pub const ROAST_FALLBACK: &str = "You're too perfect to roast!";
pub const TOAST_FALLBACK: &str = "Looking absolutely stunning!";
pub const NOT_SPECIFIED: &str = "Not specified";

/// One kind of image question: the instruction sent along with the image and
/// the validation applied to the JSON object extracted from the answer.
pub trait AnalysisTask: Send + Sync {
    type Output: Send;

    fn name(&self) -> &'static str;

    fn instruction(&self) -> String;

    /// `Err` means the answer is unusable and the next model should be tried.
    fn parse(&self, object: Map<String, Value>) -> Result<Self::Output, String>;
}

fn number(object: &Map<String, Value>, key: &str) -> Result<f64, String> {
    match object.get(key) {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    }
    .filter(|n: &f64| n.is_finite())
    .ok_or_else(|| format!("missing numeric field `{}`", key))
}

fn text(object: &Map<String, Value>, key: &str) -> Option<String> {
    match object.get(key) {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Some(Value::Array(items)) => {
            let joined = items
                .iter()
                .filter_map(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .collect::<Vec<_>>()
                .join(", ");
            (!joined.is_empty()).then_some(joined)
        }
        _ => None,
    }
}

/// Integer scores get a random fractional part so leaderboard values rarely tie;
/// everything is kept at three decimals.
pub fn normalize_final_score<R: Rng + ?Sized>(score: f64, rng: &mut R) -> f64 {
    let rounded = (score * 1000.0).round() / 1000.0;
    if rounded.fract() != 0.0 {
        return rounded;
    }
    let millis = rounded * 1000.0 + f64::from(rng.random_range(1..=999u32));
    millis / 1000.0
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RateMeScores {
    pub facial_harmony: f64,
    pub skin: f64,
    pub style: f64,
    pub expression: f64,
    pub photo_quality: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RateMeAnalysis {
    pub scores: RateMeScores,
    pub final_score: f64,
    pub roast: String,
    pub toast: String,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RateMeTask;

impl AnalysisTask for RateMeTask {
    type Output = RateMeAnalysis;

    fn name(&self) -> &'static str {
        "rate-me"
    }

    fn instruction(&self) -> String {
        "You are a witty but kind photo judge. Rate the person in this photo from 1 to 10 \
         on facial_harmony, skin, style, expression and photo_quality, then give a final_score \
         with three decimals. Add a short playful roast and a warm toast. Reply with JSON only: \
         {\"facial_harmony\": n, \"skin\": n, \"style\": n, \"expression\": n, \
         \"photo_quality\": n, \"final_score\": n, \"roast\": \"...\", \"toast\": \"...\"}"
            .to_string()
    }

    fn parse(&self, object: Map<String, Value>) -> Result<RateMeAnalysis, String> {
        let scores = RateMeScores {
            facial_harmony: number(&object, "facial_harmony")?,
            skin: number(&object, "skin")?,
            style: number(&object, "style")?,
            expression: number(&object, "expression")?,
            photo_quality: number(&object, "photo_quality")?,
        };
        let final_score = normalize_final_score(number(&object, "final_score")?, &mut rand::rng());
        Ok(RateMeAnalysis {
            scores,
            final_score,
            roast: text(&object, "roast").unwrap_or_else(|| ROAST_FALLBACK.to_string()),
            toast: text(&object, "toast").unwrap_or_else(|| TOAST_FALLBACK.to_string()),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StyleAnalysis {
    pub art_style: String,
    pub lighting: String,
    pub color_palette: String,
    pub composition: String,
    pub mood: String,
    pub camera: String,
    pub suggested_prompt: String,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct StyleTask;

impl AnalysisTask for StyleTask {
    type Output = StyleAnalysis;

    fn name(&self) -> &'static str {
        "extract-style"
    }

    fn instruction(&self) -> String {
        "Describe the visual style of this image so it can be recreated with an image \
         generator. Reply with JSON only: {\"art_style\": \"...\", \"lighting\": \"...\", \
         \"color_palette\": [\"...\"], \"composition\": \"...\", \"mood\": \"...\", \
         \"camera\": \"...\", \"suggested_prompt\": \"...\"}"
            .to_string()
    }

    fn parse(&self, object: Map<String, Value>) -> Result<StyleAnalysis, String> {
        let suggested_prompt =
            text(&object, "suggested_prompt").ok_or("missing field `suggested_prompt`")?;
        let describe = |key: &str| text(&object, key).unwrap_or_else(|| NOT_SPECIFIED.to_string());
        Ok(StyleAnalysis {
            art_style: describe("art_style"),
            lighting: describe("lighting"),
            color_palette: describe("color_palette"),
            composition: describe("composition"),
            mood: describe("mood"),
            camera: describe("camera"),
            suggested_prompt,
        })
    }
}
