use crate::compiler::CompileOptions;
use crate::expr::Expr;
use crate::lower::{Axis, Stmt};
use crate::unit::{ExecutionUnit, Task, Trigger};
use std::time::Duration;

const PRELUDE: &str = r#"#include <switch.h>
#include <stdio.h>
#include <string.h>
#include <stdbool.h>
#include <stdatomic.h>
#include <pthread.h>

typedef struct {
    float x;
    float y;
} Sprite;
"#;

const RUNTIME: &str = r#"static bool task_yield(void) {
    u64 seen = atomic_load(&tick);
    while (atomic_load(&tick) == seen) {
        if (atomic_load(&exit_requested)) {
            return false;
        }
        svcSleepThread(1000000ULL);
    }
    return !atomic_load(&exit_requested);
}

static bool task_sleep(u64 ns) {
    const u64 slice = 10000000ULL;
    while (ns > 0) {
        if (atomic_load(&exit_requested)) {
            return false;
        }
        u64 step = ns < slice ? ns : slice;
        svcSleepThread(step);
        ns -= step;
    }
    return !atomic_load(&exit_requested);
}

static bool key_held(u64 mask) {
    return (atomic_load(&input_held) & mask) != 0;
}
"#;

/// Renders the complete program: shared declarations, one thread function
/// per task, and the scheduler loop in `main`.
pub fn assemble(units: &[ExecutionUnit], options: &CompileOptions) -> String {
    let task_count = units.iter().map(|u| u.tasks.len()).sum::<usize>();
    let mut w = CodeWriter::new();
    w.raw(PRELUDE);
    w.blank();
    w.line(&format!("#define NUM_SPRITES {}", units.len()));
    w.line(&format!("#define NUM_TASKS {}", task_count));
    w.blank();
    w.line("static Sprite sprites[NUM_SPRITES > 0 ? NUM_SPRITES : 1];");
    w.line("static pthread_t task_threads[NUM_TASKS > 0 ? NUM_TASKS : 1];");
    w.line("static atomic_bool exit_requested = false;");
    w.line("static _Atomic u64 input_held = 0;");
    w.line("static _Atomic u64 tick = 0;");
    w.blank();
    w.raw(RUNTIME);

    for unit in units {
        for (index, task) in unit.tasks.iter().enumerate() {
            w.blank();
            write_task(&mut w, unit, index, task);
        }
    }

    w.blank();
    write_main(&mut w, units, options);
    w.finish()
}

pub fn task_name(actor: usize, index: usize) -> String {
    format!("task_{}_{}", actor, index)
}

fn write_task(w: &mut CodeWriter, unit: &ExecutionUnit, index: usize, task: &Task) {
    w.line(&format!(
        "// sprite #{} \"{}\", script {}",
        unit.actor,
        comment_text(&unit.name),
        comment_text(&task.entry)
    ));
    w.open(&format!("static void* {}(void* arg) {{", task_name(unit.actor, index)));
    w.line("(void)arg;");
    match task.trigger {
        Trigger::FlagClicked => write_stmts(w, unit.actor, &task.body, 0),
        Trigger::KeyPressed(button) => {
            w.open("while (task_yield()) {");
            w.open(&format!("if (!key_held({})) {{", button.c_name()));
            w.line("continue;");
            w.close("}");
            write_stmts(w, unit.actor, &task.body, 0);
            w.close("}");
        }
    }
    w.line("return NULL;");
    w.close("}");
}

fn write_main(w: &mut CodeWriter, units: &[ExecutionUnit], options: &CompileOptions) {
    w.open("int main(int argc, char* argv[]) {");
    w.line("(void)argc;");
    w.line("(void)argv;");
    w.line("consoleInit(NULL);");
    w.line("consoleClear();");

    if !units.is_empty() {
        w.blank();
        for unit in units {
            w.line(&format!("sprites[{}].x = {};", unit.actor, format_num(unit.x)));
            w.line(&format!("sprites[{}].y = {};", unit.actor, format_num(unit.y)));
        }
    }

    let mut slot = 0usize;
    let mut spawned = false;
    for unit in units {
        for index in 0..unit.tasks.len() {
            if !spawned {
                w.blank();
                spawned = true;
            }
            w.line(&format!(
                "pthread_create(&task_threads[{}], NULL, {}, NULL);",
                slot,
                task_name(unit.actor, index)
            ));
            slot += 1;
        }
    }

    w.blank();
    w.open("while (appletMainLoop()) {");
    w.line("hidScanInput();");
    w.line("u64 kDown = hidKeysDown(CONTROLLER_P1_AUTO);");
    w.line("u64 kHeld = hidKeysHeld(CONTROLLER_P1_AUTO);");
    w.line("atomic_store(&input_held, kHeld);");
    w.open(&format!("if (kDown & {}) {{", options.exit_button.c_name()));
    w.line("break;");
    w.close("}");
    w.line("atomic_fetch_add(&tick, 1);");
    w.line("consoleUpdate(NULL);");
    w.close("}");

    w.blank();
    w.line("atomic_store(&exit_requested, true);");
    w.open("for (int t = 0; t < NUM_TASKS; t++) {");
    w.line("pthread_join(task_threads[t], NULL);");
    w.close("}");
    w.line("consoleExit(NULL);");
    w.line("return 0;");
    w.close("}");
}

fn write_stmts(w: &mut CodeWriter, actor: usize, stmts: &[Stmt], depth: usize) {
    for stmt in stmts {
        write_stmt(w, actor, stmt, depth);
    }
}

fn write_stmt(w: &mut CodeWriter, actor: usize, stmt: &Stmt, depth: usize) {
    match stmt {
        Stmt::Change { axis, delta } => w.line(&format!(
            "sprites[{}].{} += {};",
            actor,
            axis_field(*axis),
            format_num(*delta)
        )),
        Stmt::Set { axis, value } => w.line(&format!(
            "sprites[{}].{} = {};",
            actor,
            axis_field(*axis),
            format_num(*value)
        )),
        Stmt::Present => w.line("consoleUpdate(NULL);"),
        Stmt::Sleep(duration) => w.line(&format!(
            "if (!task_sleep({})) return NULL;",
            render_duration(*duration)
        )),
        Stmt::Say { actor, text } => w.line(&format!(
            "printf(\"Sprite %d says: %s\\n\", {}, {});",
            actor,
            c_string(text)
        )),
        Stmt::Repeat { times, body } => {
            let var = format!("r{}", depth);
            w.open(&format!(
                "for (u64 {v} = 0; {v} < {}ULL; {v}++) {{",
                times,
                v = var
            ));
            w.line("if (!task_yield()) return NULL;");
            write_stmts(w, actor, body, depth + 1);
            w.close("}");
        }
        Stmt::Forever { body } => {
            w.open("while (task_yield()) {");
            write_stmts(w, actor, body, depth + 1);
            w.close("}");
            w.line("return NULL;");
        }
        Stmt::If {
            condition,
            then_body,
            else_body,
        } => {
            w.open(&format!("if ({}) {{", render_expr(condition)));
            write_stmts(w, actor, then_body, depth + 1);
            if !else_body.is_empty() {
                w.reopen("} else {");
                write_stmts(w, actor, else_body, depth + 1);
            }
            w.close("}");
        }
        Stmt::Glide { x, y, steps, step } => {
            let var = format!("g{}", depth);
            w.open(&format!(
                "for (int {v} = 0; {v} < {}; {v}++) {{",
                steps,
                v = var
            ));
            w.line(&format!(
                "sprites[{a}].x += ({} - sprites[{a}].x) / ({} - {v});",
                format_num(*x),
                steps,
                a = actor,
                v = var
            ));
            w.line(&format!(
                "sprites[{a}].y += ({} - sprites[{a}].y) / ({} - {v});",
                format_num(*y),
                steps,
                a = actor,
                v = var
            ));
            w.line("consoleUpdate(NULL);");
            w.line(&format!(
                "if (!task_sleep({})) return NULL;",
                render_duration(*step)
            ));
            w.close("}");
        }
    }
}

pub fn render_expr(expr: &Expr) -> String {
    match expr {
        Expr::Number(v) => format_num(*v),
        Expr::Text(text) => c_string(text),
        Expr::Bool(true) => "1".to_string(),
        Expr::Bool(false) => "0".to_string(),
        Expr::ButtonHeld(button) => format!("key_held({})", button.c_name()),
        Expr::NumCompare { op, left, right } => format!(
            "({} {} {})",
            format_num(*left),
            op.symbol(),
            format_num(*right)
        ),
        Expr::TextCompare { op, left, right } => format!(
            "(strcmp({}, {}) {} 0)",
            c_string(left),
            c_string(right),
            op.symbol()
        ),
        Expr::Not(inner) => format!("(!{})", render_expr(inner)),
        Expr::And(left, right) => format!("({} && {})", render_expr(left), render_expr(right)),
        Expr::Or(left, right) => format!("({} || {})", render_expr(left), render_expr(right)),
    }
}

fn axis_field(axis: Axis) -> &'static str {
    match axis {
        Axis::X => "x",
        Axis::Y => "y",
    }
}

/// Nanoseconds for `task_sleep`, written as milliseconds when exact.
fn render_duration(duration: Duration) -> String {
    let nanos = duration.as_nanos().min(u128::from(u64::MAX));
    if nanos % 1_000_000 == 0 {
        format!("{} * 1000000ULL", nanos / 1_000_000)
    } else {
        format!("{}ULL", nanos)
    }
}

pub fn escape_c_string(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            // Octal keeps the escape from swallowing following hex digits.
            c if c.is_control() && (c as u32) < 0x80 => {
                out.push_str(&format!("\\{:03o}", c as u32))
            }
            c => out.push(c),
        }
    }
    out
}

fn c_string(text: &str) -> String {
    format!("\"{}\"", escape_c_string(text))
}

/// Text safe inside a `//` comment: no line breaks and no backslash that
/// could splice the next line into the comment.
fn comment_text(text: &str) -> String {
    text.chars()
        .map(|c| if c == '\\' || c.is_control() { ' ' } else { c })
        .collect()
}

/// Largest magnitude below which every whole f64 is exact (2^53).
const EXACT_INT_LIMIT: f64 = 9_007_199_254_740_992.0;

/// C literal for `v`. Whole values print as integers while that is exact;
/// everything else uses the shortest form that reads back as the same f64.
fn format_num(v: f64) -> String {
    if v.fract() == 0.0 && v.abs() < EXACT_INT_LIMIT {
        format!("{}", v as i64)
    } else {
        format!("{:?}", v)
    }
}

struct CodeWriter {
    out: String,
    indent: usize,
}

impl CodeWriter {
    fn new() -> Self {
        Self {
            out: String::new(),
            indent: 0,
        }
    }

    fn raw(&mut self, text: &str) {
        self.out.push_str(text);
    }

    fn blank(&mut self) {
        self.out.push('\n');
    }

    fn line(&mut self, text: &str) {
        for _ in 0..self.indent {
            self.out.push_str("    ");
        }
        self.out.push_str(text);
        self.out.push('\n');
    }

    fn open(&mut self, text: &str) {
        self.line(text);
        self.indent += 1;
    }

    fn reopen(&mut self, text: &str) {
        self.indent = self.indent.saturating_sub(1);
        self.line(text);
        self.indent += 1;
    }

    fn close(&mut self, text: &str) {
        self.indent = self.indent.saturating_sub(1);
        self.line(text);
    }

    fn finish(self) -> String {
        self.out
    }
}
