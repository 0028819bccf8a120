/*

 ▄▄▄▄    ██▓    ▄▄▄       ▄████▄   ██ ▄█▀ ██▀███   █    ██   ██████  ██░ ██
▓█████▄ ▓██▒   ▒████▄    ▒██▀ ▀█   ██▄█▒ ▓██ ▒ ██▒ ██  ▓██▒▒██    ▒ ▓██░ ██▒
▒██▒ ▄██▒██░   ▒██  ▀█▄  ▒▓█    ▄ ▓███▄░ ▓██ ░▄█ ▒▓██  ▒██░░ ▓██▄   ▒██▀▀██░
▒██░█▀  ▒██░   ░██▄▄▄▄██ ▒▓▓▄ ▄██▒▓██ █▄ ▒██▀▀█▄  ▓▓█  ░██░  ▒   ██▒░▓█ ░██
░▓█  ▀█▓░██████▒▓█   ▓██▒▒ ▓███▀ ░▒██▒ █▄░██▓ ▒██▒▒▒█████▓ ▒██████▒▒░▓█▒░██▓
░▒▓███▀▒░ ▒░▓  ░▒▒   ▓▒█░░ ░▒ ▒  ░▒ ▒▒ ▓▒░ ▒▓ ░▒▓░░▒▓▒ ▒ ▒ ▒ ▒▓▒ ▒ ░ ▒ ░░▒░▒
▒░▒   ░ ░ ░ ▒  ░ ▒   ▒▒ ░  ░  ▒   ░ ░▒ ▒░  ░▒ ░ ▒░░░▒░ ░ ░ ░ ░▒  ░ ░ ▒ ░▒░ ░
 ░    ░   ░ ░    ░   ▒   ░        ░ ░░ ░   ░░   ░  ░░░ ░ ░ ░  ░  ░   ░  ░░ ░
 ░          ░  ░     ░  ░░ ░      ░  ░      ░        ░           ░   ░  ░  ░
      ░                  ░
Copyright (C) 2026, Blackrush LLC, All Rights Reserved
Created by Erik Olson, Tarpon Springs, Florida
For more information, visit BlackrushDrive.com

MIT License

Copyright (c) 2026 Erik Lee Olson for Blackrush, LLC

Permission is hereby granted, free of charge, to any person obtaining a copy
of this software and associated documentation files (the "Software"), to deal
in the Software without restriction, including without limitation the rights
to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
copies of the Software, and to permit persons to whom the Software is
furnished to do so, subject to the following conditions:

The above copyright notice and this permission notice shall be included in all
copies or substantial portions of the Software.

THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
SOFTWARE.

*/

//! Textual IR parser: `module`/`class`/`method` declarations with
//! stack-machine instruction bodies, labels and call references.
use objectir_common::{ErrorKind, IrError, Result};
use objectir_ir::{
    BranchTarget, CallTarget, Field, FieldTarget, Instruction, Method, Module, OpCode, Operand,
    Param, TypeDef, TypeKind, TypeRef,
};
use objectir_lexer::{Lexer, Token, TokenKind};

pub fn parse(src: &str) -> Result<Module> {
    let mut lx = Lexer::new(src);
    let tokens = lx.tokenize()?;
    Parser::new(tokens).parse_module()
}

struct Parser { tokens: Vec<Token>, i: usize }

impl Parser {
    fn new(tokens: Vec<Token>) -> Self { Self { tokens, i: 0 } }

    fn parse_module(&mut self) -> Result<Module> {
        let mut module = Module { name: "ObjectIRModule".to_string(), ..Module::default() };

        // Optional `module <name>` / `version "<v>"` header.
        while !self.check(TokenKind::Eof) {
            if self.check_kw("module") {
                self.advance();
                if self.check(TokenKind::Ident) { module.name = self.advance().lexeme; }
            } else if self.check_kw("version") {
                self.advance();
                if self.check(TokenKind::String) || self.check(TokenKind::Number) {
                    module.version = self.advance().text;
                }
            } else if self.check_kw("class") || self.check_kw("interface") || self.check_kw("struct") || self.check_kw("enum") {
                break;
            } else {
                self.advance();
            }
        }

        while !self.check(TokenKind::Eof) {
            if self.check_kw("class") {
                module.types.push(self.parse_type(TypeKind::Class)?);
            } else if self.check_kw("interface") {
                module.types.push(self.parse_type(TypeKind::Interface)?);
            } else if self.check_kw("struct") {
                module.types.push(self.parse_type(TypeKind::Struct)?);
            } else if self.check_kw("enum") {
                module.types.push(self.parse_type(TypeKind::Enum)?);
            } else {
                self.advance();
            }
        }

        Ok(module)
    }

    fn parse_type(&mut self, kind: TypeKind) -> Result<TypeDef> {
        self.advance(); // 'class' etc.
        let name = self.expect_ident("type name")?;
        let mut def = TypeDef::class(name);
        def.kind = kind;

        if self.match_k(TokenKind::Colon) {
            def.base = Some(self.expect_ident("base class name")?);
        }
        if self.check_kw("implements") {
            self.advance();
            loop {
                def.interfaces.push(self.expect_ident("interface name")?);
                if !self.match_k(TokenKind::Comma) { break; }
            }
        }

        self.match_k(TokenKind::LBrace);

        while !self.check(TokenKind::RBrace) && !self.check(TokenKind::Eof) {
            // Modifiers apply to the next member only.
            let mut is_static = false;
            let mut is_virtual = false;
            let mut is_abstract = false;
            while self.check_kw("private") || self.check_kw("public") || self.check_kw("protected")
                || self.check_kw("static") || self.check_kw("virtual") || self.check_kw("abstract")
            {
                match self.peek().lexeme.as_str() {
                    "static" => is_static = true,
                    "virtual" => is_virtual = true,
                    "abstract" => is_abstract = true,
                    _ => {}
                }
                self.advance();
            }

            if self.check_kw("field") {
                let mut field = self.parse_field()?;
                field.is_static = is_static;
                def.fields.push(field);
            } else if self.check_kw("method") || self.check_kw("constructor") {
                let mut method = self.parse_method()?;
                method.is_static = if method.is_ctor { false } else { is_static };
                method.is_virtual = is_virtual;
                method.is_abstract = is_abstract;
                def.methods.push(method);
            } else if !self.check(TokenKind::RBrace) {
                self.advance();
            }
        }

        self.match_k(TokenKind::RBrace);
        Ok(def)
    }

    fn parse_field(&mut self) -> Result<Field> {
        self.advance(); // 'field'
        let name = self.expect_ident("field name")?;
        self.expect(TokenKind::Colon, "':' after field name")?;
        let ty = self.parse_type_spelling()?;
        Ok(Field::new(name, TypeRef::parse(&ty)))
    }

    fn parse_method(&mut self) -> Result<Method> {
        let is_ctor = self.check_kw("constructor");
        self.advance(); // 'method' | 'constructor'
        let name = self.expect_ident("method name")?;
        self.expect(TokenKind::LParen, "'(' after method name")?;

        let mut method = Method::new(name, TypeRef::VOID, false);
        method.is_ctor = is_ctor;

        while !self.check(TokenKind::RParen) && !self.check(TokenKind::Eof) {
            if self.check(TokenKind::Ident) {
                let pname = self.advance().lexeme;
                self.expect(TokenKind::Colon, "':' after parameter name")?;
                let pty = self.parse_type_spelling()?;
                method.params.push(Param { name: pname, ty: TypeRef::parse(&pty) });
                self.match_k(TokenKind::Comma);
            } else {
                self.advance();
            }
        }
        self.expect(TokenKind::RParen, "')' after parameters")?;

        if self.match_k(TokenKind::Arrow) {
            let rty = self.parse_type_spelling()?;
            method.return_type = TypeRef::parse(&rty);
        }

        if self.match_k(TokenKind::LBrace) {
            self.parse_body(&mut method)?;
            self.expect(TokenKind::RBrace, "'}' closing method body")?;
        }

        Ok(method)
    }

    fn parse_body(&mut self, method: &mut Method) -> Result<()> {
        while !self.check(TokenKind::RBrace) && !self.check(TokenKind::Eof) {
            if self.check_kw("local") {
                // local name: type
                self.advance();
                let lname = self.expect_ident("local name")?;
                self.expect(TokenKind::Colon, "':' after local name")?;
                let lty = self.parse_type_spelling()?;
                method.locals.push(Param { name: lname, ty: TypeRef::parse(&lty) });
            } else if self.at_label() {
                // label:
                let label = self.advance().lexeme;
                self.advance(); // ':'
                method.label_map.insert(label, method.instructions.len());
            } else if self.check(TokenKind::Instruction) {
                let instr = self.parse_instruction()?;
                method.instructions.push(instr);
            } else {
                self.advance();
            }
        }
        Ok(())
    }

    /// A label is an identifier directly followed by a colon.
    fn at_label(&self) -> bool {
        self.check(TokenKind::Ident)
            && self.tokens.get(self.i + 1).map_or(false, |t| t.kind == TokenKind::Colon)
    }

    fn parse_instruction(&mut self) -> Result<Instruction> {
        let mnemonic = self.advance();
        let op = OpCode::parse(&mnemonic.lexeme)?;

        // Collect operand tokens until the next instruction, label, local
        // declaration or brace.
        let mut args: Vec<Token> = Vec::new();
        while !self.check(TokenKind::Instruction)
            && !self.check(TokenKind::LBrace)
            && !self.check(TokenKind::RBrace)
            && !self.check(TokenKind::Eof)
            && !self.check(TokenKind::Keyword)
            && !self.at_label()
        {
            args.push(self.advance());
        }

        let operand = self.build_operand(&mnemonic.lexeme, op, &args)?;
        Ok(Instruction::with(op, operand))
    }

    fn build_operand(&self, mnemonic: &str, op: OpCode, args: &[Token]) -> Result<Operand> {
        use OpCode::*;

        let first = args.first();
        match op {
            LdArg => match first {
                Some(t) if t.kind == TokenKind::Number => {
                    let index = t.lexeme.parse::<usize>().map_err(|_| {
                        IrError::new(ErrorKind::MalformedOperand, format!("ldarg index '{}'", t.lexeme))
                    })?;
                    Ok(Operand::Index(index))
                }
                Some(t) => Ok(Operand::Name(t.lexeme.clone())),
                None => Ok(Operand::None),
            },
            StArg | LdLoc | StLoc => match first {
                Some(t) => Ok(Operand::Name(t.lexeme.clone())),
                None => Ok(Operand::None),
            },

            LdStr => {
                let value = first.map(|t| t.text.clone()).unwrap_or_default();
                Ok(Operand::Const { value, ty: "string".to_string(), is_null: false })
            }
            LdC => {
                // `ldc <value>[: <type>]`; an untyped constant defaults to
                // int32 (float64 when it carries a decimal point).
                let value = first
                    .map(|t| t.text.clone())
                    .ok_or_else(|| IrError::new(ErrorKind::MalformedOperand, "ldc missing constant"))?;
                let ty = match args.iter().position(|t| t.kind == TokenKind::Colon) {
                    Some(i) => args
                        .get(i + 1)
                        .map(|t| t.lexeme.clone())
                        .unwrap_or_else(|| "int32".to_string()),
                    None if value.contains('.') => "float64".to_string(),
                    None => "int32".to_string(),
                };
                Ok(Operand::Const { value, ty, is_null: false })
            }
            LdI4 | LdI8 => {
                let value = first
                    .map(|t| t.lexeme.clone())
                    .ok_or_else(|| IrError::new(ErrorKind::MalformedOperand, format!("{} missing value", mnemonic)))?;
                let n = value.parse::<i64>().map_err(|_| {
                    IrError::new(ErrorKind::MalformedOperand, format!("{} value '{}'", mnemonic, value))
                })?;
                Ok(Operand::Int(n))
            }
            LdR4 | LdR8 => {
                let value = first
                    .map(|t| t.lexeme.clone())
                    .ok_or_else(|| IrError::new(ErrorKind::MalformedOperand, format!("{} missing value", mnemonic)))?;
                let x = value.parse::<f64>().map_err(|_| {
                    IrError::new(ErrorKind::MalformedOperand, format!("{} value '{}'", mnemonic, value))
                })?;
                Ok(Operand::Float(x))
            }

            Call | CallVirt => Ok(Operand::Call(parse_call_reference(args)?)),

            LdFld | StFld => {
                let spelling = first
                    .map(|t| t.lexeme.clone())
                    .ok_or_else(|| IrError::new(ErrorKind::MalformedOperand, format!("{} missing field", mnemonic)))?;
                Ok(Operand::Field(split_field_spelling(&spelling)))
            }
            LdSFld | StSFld => {
                let spelling = first
                    .map(|t| t.lexeme.clone())
                    .ok_or_else(|| IrError::new(ErrorKind::MalformedOperand, format!("{} missing field", mnemonic)))?;
                let target = split_field_spelling(&spelling);
                if target.declaring_type.is_empty() {
                    return Err(IrError::new(
                        ErrorKind::MalformedOperand,
                        format!("{} requires a qualified Type.field operand", mnemonic),
                    ));
                }
                Ok(Operand::StaticField { declaring_type: target.declaring_type, name: target.name })
            }

            NewObj | NewArr | CastClass | IsInst | Conv => match first {
                Some(t) => Ok(Operand::TypeName(t.lexeme.clone())),
                None => Err(IrError::new(
                    ErrorKind::MalformedOperand,
                    format!("{} missing type operand", mnemonic),
                )),
            },

            Br | BrTrue | BrFalse | Beq | Bne | Bgt | Bge | Blt | Ble => match first {
                Some(t) if t.kind == TokenKind::Number => {
                    let index = t.lexeme.parse::<usize>().map_err(|_| {
                        IrError::new(ErrorKind::MalformedOperand, format!("branch target '{}'", t.lexeme))
                    })?;
                    Ok(Operand::Branch(BranchTarget::Index(index)))
                }
                Some(t) => Ok(Operand::Branch(BranchTarget::Label(t.lexeme.clone()))),
                None => Err(IrError::new(ErrorKind::MalformedOperand, format!("{} missing target", mnemonic))),
            },

            _ => Ok(Operand::None),
        }
    }

    /// Type spellings: a primitive or dotted identifier, optionally
    /// suffixed with `[]`.
    fn parse_type_spelling(&mut self) -> Result<String> {
        let mut spelling = self.expect_ident("type name")?;
        while self.check_ident("[") {
            self.advance();
            if self.check_ident("]") { self.advance(); }
            spelling.push_str("[]");
        }
        Ok(spelling)
    }

    // --- token plumbing ---

    fn peek(&self) -> &Token {
        &self.tokens[self.i.min(self.tokens.len() - 1)]
    }

    fn advance(&mut self) -> Token {
        let t = self.tokens[self.i.min(self.tokens.len() - 1)].clone();
        if self.i < self.tokens.len() { self.i += 1; }
        t
    }

    fn check(&self, kind: TokenKind) -> bool {
        self.peek().kind == kind
    }

    fn check_kw(&self, word: &str) -> bool {
        self.peek().kind == TokenKind::Keyword && self.peek().lexeme == word
    }

    fn check_ident(&self, word: &str) -> bool {
        self.peek().kind == TokenKind::Ident && self.peek().lexeme == word
    }

    fn match_k(&mut self, kind: TokenKind) -> bool {
        if self.check(kind) { self.advance(); true } else { false }
    }

    fn expect(&mut self, kind: TokenKind, what: &str) -> Result<Token> {
        if !self.check(kind) {
            return Err(IrError::new(
                ErrorKind::MalformedOperand,
                format!("expected {} (found '{}')", what, self.peek().lexeme),
            ));
        }
        Ok(self.advance())
    }

    fn expect_ident(&mut self, what: &str) -> Result<String> {
        // Primitive spellings lex as instructions never, but type names may
        // collide with keywords in odd modules; accept plain identifiers.
        if self.check(TokenKind::Ident) {
            return Ok(self.advance().lexeme);
        }
        Err(IrError::new(
            ErrorKind::MalformedOperand,
            format!("expected {} (found '{}')", what, self.peek().lexeme),
        ))
    }
}

/// `Type.Method ( t1, t2 ) -> ret` following a `call`/`callvirt`.
fn parse_call_reference(args: &[Token]) -> Result<CallTarget> {
    let full = args
        .first()
        .map(|t| t.lexeme.clone())
        .ok_or_else(|| IrError::new(ErrorKind::MalformedOperand, "call missing method reference"))?;

    // `.ctor` produces a double dot: Type`1..ctor
    let (declaring, name) = if let Some(idx) = full.find("..") {
        (full[..idx].to_string(), full[idx + 1..].to_string())
    } else {
        match full.rfind('.') {
            Some(dot) => (full[..dot].to_string(), full[dot + 1..].to_string()),
            None => ("object".to_string(), full),
        }
    };

    let mut parameter_types: Vec<String> = Vec::new();
    let mut return_type = "void".to_string();
    let mut in_params = false;
    let mut i = 1;
    while i < args.len() {
        let tok = &args[i];
        match tok.kind {
            TokenKind::LParen => in_params = true,
            TokenKind::RParen => in_params = false,
            TokenKind::Arrow => {
                if let Some(ret) = args.get(i + 1) {
                    return_type = ret.lexeme.clone();
                }
                break;
            }
            TokenKind::Comma => {}
            _ if in_params => parameter_types.push(tok.lexeme.clone()),
            _ => {}
        }
        i += 1;
    }

    let params: Vec<&str> = parameter_types.iter().map(|s| s.as_str()).collect();
    Ok(CallTarget::new(declaring, name, &return_type, &params))
}

fn split_field_spelling(spelling: &str) -> FieldTarget {
    match spelling.rfind('.') {
        Some(dot) => FieldTarget {
            declaring_type: spelling[..dot].to_string(),
            name: spelling[dot + 1..].to_string(),
            ty: String::new(),
        },
        None => FieldTarget { declaring_type: String::new(), name: spelling.to_string(), ty: String::new() },
    }
}
