pub const DEFAULT_PROMPT: &str = r#"You are a CAD expert. The attached images are orthographic views of one
mechanical part: a rectangular block whose top section may have one rounded
vertical corner, and which may have one cylindrical hole.

Measure the part from the views and answer with ONLY a JSON object of this
exact shape (numbers in millimetres, no comments, no trailing text):

{
  "width": <X extent>,
  "depth": <Y extent>,
  "height": <Z extent>,
  "fillet": {
    "radius": <radius of the rounded corner, 0 if the corner is sharp>,
    "height": <how far the rounded corner reaches down from the top, 0 if none>,
    "corner": "x_max_y_max" | "x_min_y_max" | "x_min_y_min" | "x_max_y_min"
  },
  "hole": null | {
    "diameter": <hole diameter>,
    "axis": "X" | "Y" | "Z",
    "center": [<x>, <y>, <z>],
    "through_all": true | false,
    "length": <depth of a blind hole; omit when through_all is true>
  }
}

Rules:
- The block occupies [0, width] x [0, depth] x [0, height].
- fillet.radius must not exceed the smaller of width and depth.
- fillet.height must not exceed height.
- The hole must fit inside the block's faces around its axis.
- Use double quotes for every key and string."#;

pub fn default_prompt() -> &'static str {
    DEFAULT_PROMPT
}

/// Prompt for one attempt: the base prompt plus what was wrong last time.
pub fn compose_prompt(base: &str, previous_errors: &[String]) -> String {
    if previous_errors.is_empty() {
        return base.to_string();
    }
    let mut out = String::with_capacity(base.len() + 256);
    out.push_str(base);
    out.push_str("\n\nYour previous answer was rejected:\n");
    for err in previous_errors {
        out.push_str("- ");
        out.push_str(err);
        out.push('\n');
    }
    out.push_str("Re-measure the views and answer again with a corrected JSON object.");
    out
}
