use crate::bytecode::{Op, ProgramBc};
use std::collections::BTreeMap;

/// How control can arrive at an op other than by falling through.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Landing {
    branch: bool,
    return_site: Option<u32>,
}

/// Print disassembly of a bytecode program
pub fn print_bc(bc: &ProgramBc) {
    println!("{}", summary_line(bc));
    println!("════════════════════════════════════════");
    print!("{}", disassemble_to_string(&bc.main.ops));
}

fn summary_line(bc: &ProgramBc) -> String {
    let dispatcher = match bc.dispatcher {
        Some(address) => format!("dispatcher at {:04}", address),
        None => "no dispatcher".to_string(),
    };
    format!(
        "; {} ops from {} source instructions, {} return sites, {}",
        bc.main.ops.len(),
        bc.source_instructions,
        bc.return_sites,
        dispatcher
    )
}

/// Return disassembly as a String. Ops reached by a branch are marked `►`,
/// ops reached only through the dispatcher `↩`, each under a rule naming how
/// it is reached.
pub fn disassemble_to_string(ops: &[Op]) -> String {
    let landings = landings(ops);
    let mut output = String::new();

    for (ip, op) in ops.iter().enumerate() {
        let marker = match landings.get(&ip) {
            Some(landing) => {
                output.push_str(&format!("      ┌─ {}\n", describe(landing)));
                if landing.branch { "►" } else { "↩" }
            }
            None => " ",
        };

        output.push_str(&format!("{:04} {} {}\n", ip, marker, format_op(op, ip)));
    }

    output
}

fn landings(ops: &[Op]) -> BTreeMap<usize, Landing> {
    let mut landings: BTreeMap<usize, Landing> = BTreeMap::new();

    for (ip, op) in ops.iter().enumerate() {
        if let Some(offset) = op.branch_offset() {
            landings.entry(target(ip, offset)).or_default().branch = true;
        }
        if let Op::Dispatch(table) = op {
            for (site, &offset) in table.iter().enumerate() {
                landings.entry(target(ip, offset)).or_default().return_site = Some(site as u32);
            }
        }
    }

    landings
}

fn describe(landing: &Landing) -> String {
    match (landing.branch, landing.return_site) {
        (true, Some(site)) => format!("branch target, return site {}", site),
        (false, Some(site)) => format!("return site {}", site),
        _ => "branch target".to_string(),
    }
}

fn target(ip: usize, offset: i32) -> usize {
    (ip as i64 + offset as i64) as usize
}

fn format_op(op: &Op, ip: usize) -> String {
    match op {
        Op::Push(n) => format!("PUSH        {}", n),
        Op::Jump(offset) | Op::JumpIfZero(offset) | Op::JumpIfNeg(offset) => {
            let direction = if *offset < 0 { "↑" } else { "↓" };
            format!(
                "{:<11} {:+} {} (→ {:04})",
                op.name(),
                offset,
                direction,
                target(ip, *offset)
            )
        }
        Op::PushReturn(site) => format!("PUSH_RET    {}", site),
        Op::Dispatch(table) => {
            let sites: Vec<String> = table
                .iter()
                .map(|&offset| format!("{:04}", target(ip, offset)))
                .collect();
            format!("DISPATCH    ; return sites [{}]", sites.join(" "))
        }
        Op::Store => "STORE       ; ( addr value -- )".to_string(),
        Op::Load => "LOAD        ; ( addr -- value )".to_string(),
        Op::ReadChar | Op::ReadNum => format!("{:<11} ; ( addr -- )", op.name()),
        other => other.name().to_string(),
    }
}

// =============================================================================
// Statistics
// =============================================================================

/// Groups ops the way Whitespace groups its instructions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Family {
    Stack,
    Arithmetic,
    Heap,
    Flow,
    Io,
}

impl Family {
    fn of(op: &Op) -> Family {
        match op {
            Op::Push(_) | Op::Dup | Op::Swap | Op::Drop => Family::Stack,
            Op::Add | Op::Sub | Op::Mul | Op::Div | Op::Mod => Family::Arithmetic,
            Op::Store | Op::Load => Family::Heap,
            Op::Jump(_)
            | Op::JumpIfZero(_)
            | Op::JumpIfNeg(_)
            | Op::PushReturn(_)
            | Op::Dispatch(_)
            | Op::Halt => Family::Flow,
            Op::WriteChar | Op::WriteNum | Op::ReadChar | Op::ReadNum => Family::Io,
        }
    }

    fn label(self) -> &'static str {
        match self {
            Family::Stack => "stack",
            Family::Arithmetic => "arithmetic",
            Family::Heap => "heap",
            Family::Flow => "flow",
            Family::Io => "i/o",
        }
    }
}

#[derive(Debug, Default, PartialEq, Eq)]
struct Stats {
    families: BTreeMap<Family, usize>,
    calls: usize,
    returns: usize,
}

fn collect_stats(bc: &ProgramBc) -> Stats {
    let mut stats = Stats::default();

    for (ip, op) in bc.main.ops.iter().enumerate() {
        *stats.families.entry(Family::of(op)).or_insert(0) += 1;

        match op {
            Op::PushReturn(_) => stats.calls += 1,
            Op::Jump(offset) if Some(target(ip, *offset)) == bc.dispatcher => stats.returns += 1,
            _ => {}
        }
    }

    stats
}

/// Print bytecode statistics
pub fn print_bc_stats(bc: &ProgramBc) {
    let stats = collect_stats(bc);
    let total = bc.main.ops.len().max(1) as f64;

    println!("{}", summary_line(bc));
    println!("call sites:  {}", stats.calls);
    println!("return ops:  {}", stats.returns);
    println!();

    for (family, count) in &stats.families {
        println!(
            "  {:<11} {:>5} ({:>5.1}%)",
            family.label(),
            count,
            *count as f64 / total * 100.0
        );
    }
}
