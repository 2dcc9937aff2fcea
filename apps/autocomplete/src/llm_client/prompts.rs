// Cross-cutting prompt fragments shared by every LLM caller.
// Field-specific prompts live next to the code that sends them.

/// System prompt fragment that enforces a bare JSON array of strings.
pub const JSON_ARRAY_ONLY_SYSTEM: &str = "\
    You MUST respond with a valid JSON array of strings only. \
    Do NOT include any text outside the array. \
    Do NOT use markdown code fences. \
    Do NOT include explanations or apologies.";
