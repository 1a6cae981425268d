//! Prompt bodies for each template
//!
//! `{objective}` and `{context}` are substituted by the builder.

pub(super) const MODULES: &str = r#"You are a product lead at a software company. You are planning the full development of a software product for a client. Below is the requirement document extracted from the client.

Your task is to analyze the requirements and generate a comprehensive Scope of Work, structured as a valid JSON object.

### OBJECTIVE:
{objective}

Break down all functional and non-functional work into logical modules. Think holistically: user interaction, content management, admin tools, reporting, notifications, integrations and security.

### OUTPUT:
Return a JSON object with a "scope_of_work" key containing an array of modules.

Each module must contain:
- "module": name of the functional area (e.g. User Management)
- "sub_modules": an array of 2-4 features, each with:
    - "sub_module": name of the feature
    - "description": clear user-oriented explanation

Return 8-10 unique modules, each with 2-4 sub-modules.

{rules}

### CONTEXT:
{context}

### FORMAT:
{
  "scope_of_work": [
    {
      "module": "string",
      "sub_modules": [
        { "sub_module": "string", "description": "string" }
      ]
    }
  ]
}
"#;

pub(super) const DETAILED: &str = r#"You are a senior solutions architect preparing an exhaustive Scope of Work from a client requirement document.

### OBJECTIVE:
{objective}

Identify every module the requirements imply. Do not stop at a fixed number of modules; cover all of them. For each module list 3-4 sub-modules and give each a detailed description of its behaviour, the users involved and the data it touches.

### OUTPUT:
Return a JSON object with a "scope_of_work" key containing an array of modules.

Each module must contain:
- "module": name of the functional area
- "sub_modules": an array of 3-4 features, each with:
    - "sub_module": name of the feature
    - "description": elaborate explanation

{rules}

### CONTEXT:
{context}

### FORMAT:
{
  "scope_of_work": [
    {
      "module": "string",
      "sub_modules": [
        { "sub_module": "string", "description": "string" }
      ]
    }
  ]
}
"#;

pub(super) const FULL_PLAN: &str = r#"You are a senior business analyst. Based on the project requirements and context, generate a detailed scope of work as a valid JSON object.

### OBJECTIVE:
{objective}

The JSON must include three sections:

1. "scope_of_work": features grouped by functional module.
   - Include at least 5 distinct modules.
   - Each item must contain "module", "sub_module" and "description".

2. "team_planning": the roles involved in the project.
   - Each item must contain "role", "responsibility" and "allocation_hours" (a number).

3. "milestones": key delivery phases.
   - Each item must contain "milestone", "modules_covered" and "estimated_days" (a number).

{rules}

### CONTEXT:
{context}

### FORMAT:
{
  "scope_of_work": [
    { "module": "string", "sub_module": "string", "description": "string" }
  ],
  "team_planning": [
    { "role": "string", "responsibility": "string", "allocation_hours": 0 }
  ],
  "milestones": [
    { "milestone": "string", "modules_covered": "string", "estimated_days": 0 }
  ]
}
"#;

pub(super) const RULES: &str = r#"IMPORTANT:
- Return only valid JSON. No markdown, no code fences, no comments.
- Do not use escaped underscores or stray backslashes.
- Place commas correctly and never leave a trailing comma.
- Always include the outer "scope_of_work" key; never return a bare array."#;
